#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Egg Merge engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative board, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the board executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values describing what
//! changed. Systems read immutable views such as [`OccupancyView`] and respond
//! with new command batches or player-facing intents.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of board rows used by the game.
pub const DEFAULT_ROWS: u32 = 8;

/// Default number of board columns used by the game.
pub const DEFAULT_COLUMNS: u32 = 6;

/// Default edge length of a square cell in world units.
pub const DEFAULT_CELL_SIZE: f32 = 150.0;

/// Commands that express all permissible board mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Rebuilds the board with the provided dimensions. Every cell starts empty.
    ConfigureBoard {
        /// Number of rows laid out in the lattice.
        rows: u32,
        /// Number of columns laid out in the lattice.
        columns: u32,
        /// Edge length of each square cell in world units.
        cell_size: f32,
        /// Direction mode used for token movement.
        move_set: MoveSet,
    },
    /// Places a token of the given kind into an empty cell.
    PlaceToken {
        /// Cell that receives the token.
        cell: CellId,
        /// Rank of the placed token.
        kind: TokenKind,
    },
    /// Removes whatever token occupies the cell.
    RemoveToken {
        /// Cell to clear.
        cell: CellId,
    },
    /// Requests that the token at `from` walk to the empty cell `to`.
    MoveToken {
        /// Cell currently holding the token.
        from: CellId,
        /// Empty destination cell.
        to: CellId,
    },
    /// Replaces the kind of the token occupying the cell.
    PromoteToken {
        /// Occupied cell whose token changes rank.
        cell: CellId,
        /// Rank assigned to the token.
        kind: TokenKind,
    },
}

/// Events broadcast by the board after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Announces that the board was rebuilt with new dimensions.
    BoardConfigured {
        /// Number of rows in the lattice.
        rows: u32,
        /// Number of columns in the lattice.
        columns: u32,
        /// Direction mode now used for movement.
        move_set: MoveSet,
    },
    /// Confirms that a token now occupies a cell.
    TokenPlaced {
        /// Cell that received the token.
        cell: CellId,
        /// Rank of the placed token.
        kind: TokenKind,
    },
    /// Confirms that a cell was cleared.
    TokenRemoved {
        /// Cell that was emptied.
        cell: CellId,
        /// Rank of the token that was removed.
        kind: TokenKind,
    },
    /// Confirms that a token walked between two cells.
    TokenMoved {
        /// Cell the token left.
        from: CellId,
        /// Cell the token occupies after the move.
        to: CellId,
        /// Rank of the moved token.
        kind: TokenKind,
        /// Steps taken, excluding `from` and ending at `to`.
        path: Vec<PathStep>,
    },
    /// Reports that a move request was refused; the board is unchanged.
    MoveRejected {
        /// Cell named as the move origin.
        from: CellId,
        /// Cell named as the move destination.
        to: CellId,
        /// Specific reason the move failed.
        reason: MoveError,
    },
    /// Confirms that an occupied cell changed rank.
    TokenPromoted {
        /// Cell whose token changed.
        cell: CellId,
        /// Rank the token had before.
        from: TokenKind,
        /// Rank the token has now.
        to: TokenKind,
    },
}

/// Reasons a move request may be rejected by the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveError {
    /// The origin cell holds no token.
    SourceEmpty,
    /// The destination cell already holds a token.
    TargetOccupied,
    /// No walkable route connects the two cells.
    NoPath,
    /// One of the cells lies outside the lattice.
    InvalidCell,
}

/// Out-of-bounds references rejected at the grid and pathfinder boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum GridError {
    /// The linear cell id does not address a cell of the lattice.
    #[error("cell id {cell} is outside a lattice of {cell_count} cells")]
    InvalidCellId {
        /// Offending identifier.
        cell: u32,
        /// Number of cells in the lattice.
        cell_count: u32,
    },
    /// The row/column pair does not address a cell of the lattice.
    #[error("coordinate ({row}, {column}) is outside a {rows}x{columns} lattice")]
    InvalidCoordinate {
        /// Offending row.
        row: i64,
        /// Offending column.
        column: i64,
        /// Number of rows in the lattice.
        rows: u32,
        /// Number of columns in the lattice.
        columns: u32,
    },
}

/// Row-major linear identifier of a board cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(u32);

impl CellId {
    /// Creates a new cell identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Position of the cell inside row-major storage.
    #[must_use]
    pub fn index(&self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

/// Location of a single cell expressed as row and column.
///
/// Rows play the role of the pathfinder's `x` axis and columns its `y` axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    row: u32,
    column: u32,
}

impl CellCoord {
    /// Creates a new cell coordinate from a row and a column.
    #[must_use]
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.row().abs_diff(other.row()) + self.column().abs_diff(other.column())
    }
}

/// Rank of an egg token. Ranks run from 0 up to the [`TokenKind::MAX`] cap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct TokenKind(u8);

const TOKEN_NAMES: [&str; 7] = [
    "white", "green", "blue", "purple", "red", "yellow", "orange",
];

impl TokenKind {
    /// Lowest rank, the plain white egg.
    pub const MIN: TokenKind = TokenKind(0);
    /// Highest rank; promotion saturates here.
    pub const MAX: TokenKind = TokenKind(6);

    /// Creates a token kind, returning `None` above the cap.
    #[must_use]
    pub const fn new(rank: u8) -> Option<Self> {
        if rank <= Self::MAX.0 {
            Some(Self(rank))
        } else {
            None
        }
    }

    /// Numeric rank of the token.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        self.0
    }

    /// Rank produced by merging a group of this kind, capped at [`TokenKind::MAX`].
    #[must_use]
    pub const fn promoted(self) -> Self {
        if self.0 >= Self::MAX.0 {
            Self::MAX
        } else {
            Self(self.0 + 1)
        }
    }

    /// Display colour of the egg.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        TOKEN_NAMES[self.0 as usize]
    }

    /// Every kind from the lowest rank up to and including `max`.
    pub fn up_to(max: TokenKind) -> impl Iterator<Item = TokenKind> {
        (0..=max.0).map(TokenKind)
    }
}

impl TryFrom<u8> for TokenKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        TokenKind::new(value)
            .ok_or_else(|| format!("token rank {value} exceeds the cap of 6"))
    }
}

impl From<TokenKind> for u8 {
    fn from(kind: TokenKind) -> Self {
        kind.0
    }
}

/// Opaque handle to a renderer-owned visual. The board never inspects it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenHandle(u64);

impl TokenHandle {
    /// Wraps a renderer-provided value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the wrapped value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Cost of an orthogonal step.
pub const ORTHOGONAL_STEP_COST: u32 = 10;

/// Cost of a diagonal step, approximating `10 * sqrt(2)`.
pub const DIAGONAL_STEP_COST: u32 = 14;

const FOUR_WAY_OFFSETS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

const EIGHT_WAY_OFFSETS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Direction mode used by the pathfinder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveSet {
    /// Up, down, left and right only.
    #[default]
    Four,
    /// Orthogonal plus diagonal moves.
    Eight,
}

impl MoveSet {
    /// `(row delta, column delta)` pairs indexed by direction.
    #[must_use]
    pub const fn offsets(self) -> &'static [(i32, i32)] {
        match self {
            Self::Four => &FOUR_WAY_OFFSETS,
            Self::Eight => &EIGHT_WAY_OFFSETS,
        }
    }

    /// Cost of stepping in the given direction.
    ///
    /// The four-way table is uniform. The eight-way table alternates between
    /// orthogonal (even index) and diagonal (odd index) moves.
    #[must_use]
    pub const fn step_cost(self, direction: u8) -> u32 {
        match self {
            Self::Four => ORTHOGONAL_STEP_COST,
            Self::Eight => {
                if direction % 2 == 0 {
                    ORTHOGONAL_STEP_COST
                } else {
                    DIAGONAL_STEP_COST
                }
            }
        }
    }

    /// Whether every node is swept back to its initial state before a search.
    ///
    /// Only the eight-way variant does this; the four-way variant relies on
    /// generation tags alone.
    #[must_use]
    pub const fn resets_eagerly(self) -> bool {
        matches!(self, Self::Eight)
    }
}

/// A single hop of a computed path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathStep {
    /// Cell reached by this hop.
    pub cell: CellCoord,
    /// Index into [`MoveSet::offsets`] of the move that reached `cell`.
    pub direction: u8,
}

/// Fixed-capacity iterator over neighbouring cells.
#[derive(Clone, Debug, Default)]
pub struct Neighbors {
    buffer: [Option<CellId>; 8],
    len: usize,
    cursor: usize,
}

impl Neighbors {
    /// Appends a neighbour; silently ignores pushes beyond eight entries.
    pub fn push(&mut self, cell: CellId) {
        if self.len < self.buffer.len() {
            self.buffer[self.len] = Some(cell);
            self.len += 1;
        }
    }
}

impl Iterator for Neighbors {
    type Item = CellId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.len {
            return None;
        }

        let value = self.buffer[self.cursor];
        self.cursor += 1;
        value
    }
}

/// Read-only view into the dense occupancy grid.
#[derive(Clone, Copy, Debug)]
pub struct OccupancyView<'a> {
    cells: &'a [Option<TokenKind>],
    rows: u32,
    columns: u32,
}

impl<'a> OccupancyView<'a> {
    /// Captures a new occupancy view backed by the provided row-major slice.
    #[must_use]
    pub fn new(cells: &'a [Option<TokenKind>], rows: u32, columns: u32) -> Self {
        Self {
            cells,
            rows,
            columns,
        }
    }

    /// Returns the token occupying the provided cell, if any.
    #[must_use]
    pub fn token_at(&self, cell: CellId) -> Option<TokenKind> {
        self.cells.get(cell.index()).copied().flatten()
    }

    /// Reports whether the cell lies inside the lattice and holds no token.
    #[must_use]
    pub fn is_empty(&self, cell: CellId) -> bool {
        matches!(self.cells.get(cell.index()), Some(None))
    }

    /// Converts an identifier into its row and column.
    #[must_use]
    pub fn coord(&self, cell: CellId) -> Option<CellCoord> {
        if self.columns == 0 || cell.index() >= self.cells.len() {
            return None;
        }
        Some(CellCoord::new(
            cell.get() / self.columns,
            cell.get() % self.columns,
        ))
    }

    /// Cells sharing an edge with `cell`, ordered up, down, left, right.
    #[must_use]
    pub fn adjacent4(&self, cell: CellId) -> Neighbors {
        let mut neighbors = Neighbors::default();
        let Some(coord) = self.coord(cell) else {
            return neighbors;
        };
        let (row, column) = (coord.row(), coord.column());

        if row > 0 {
            neighbors.push(CellId::new(cell.get() - self.columns));
        }
        if row + 1 < self.rows {
            neighbors.push(CellId::new(cell.get() + self.columns));
        }
        if column > 0 {
            neighbors.push(CellId::new(cell.get() - 1));
        }
        if column + 1 < self.columns {
            neighbors.push(CellId::new(cell.get() + 1));
        }

        neighbors
    }

    /// Returns an iterator over all cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = Option<TokenKind>> + 'a {
        self.cells.iter().copied()
    }

    /// Provides the `(rows, columns)` dimensions of the lattice.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.rows, self.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::{CellCoord, CellId, MoveError, MoveSet, OccupancyView, PathStep, TokenKind};
    use serde::{de::DeserializeOwned, Serialize};

    #[test]
    fn manhattan_distance_matches_expectation() {
        let origin = CellCoord::new(1, 1);
        let destination = CellCoord::new(4, 3);
        assert_eq!(origin.manhattan_distance(destination), 5);
        assert_eq!(destination.manhattan_distance(origin), 5);
    }

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn path_step_round_trips_through_bincode() {
        assert_round_trip(&PathStep {
            cell: CellCoord::new(3, 2),
            direction: 1,
        });
    }

    #[test]
    fn move_error_round_trips_through_bincode() {
        assert_round_trip(&MoveError::NoPath);
    }

    #[test]
    fn token_kind_rejects_ranks_above_cap() {
        assert!(TokenKind::new(6).is_some());
        assert!(TokenKind::new(7).is_none());
        assert!(bincode::deserialize::<TokenKind>(&[9]).is_err());
    }

    #[test]
    fn promotion_saturates_at_cap() {
        let blue = TokenKind::new(2).expect("rank 2");
        assert_eq!(blue.promoted().rank(), 3);
        assert_eq!(TokenKind::MAX.promoted(), TokenKind::MAX);
        assert_eq!(TokenKind::MAX.name(), "orange");
        assert_eq!(TokenKind::up_to(blue).count(), 3);
    }

    #[test]
    fn eight_way_costs_alternate_by_parity() {
        let costs: Vec<u32> = (0..8).map(|dir| MoveSet::Eight.step_cost(dir)).collect();
        assert_eq!(costs, vec![10, 14, 10, 14, 10, 14, 10, 14]);
        assert!((0..4).all(|dir| MoveSet::Four.step_cost(dir) == 10));
        assert!(MoveSet::Eight.resets_eagerly());
        assert!(!MoveSet::Four.resets_eagerly());
    }

    #[test]
    fn adjacent4_excludes_out_of_bounds_cells() {
        let cells = vec![None; 48];
        let view = OccupancyView::new(&cells, 8, 6);

        let corner: Vec<u32> = view.adjacent4(CellId::new(0)).map(|c| c.get()).collect();
        assert_eq!(corner, vec![6, 1]);

        let inner: Vec<u32> = view.adjacent4(CellId::new(8)).map(|c| c.get()).collect();
        assert_eq!(inner, vec![2, 14, 7, 9]);

        let last: Vec<u32> = view.adjacent4(CellId::new(47)).map(|c| c.get()).collect();
        assert_eq!(last, vec![41, 46]);

        assert_eq!(view.adjacent4(CellId::new(48)).count(), 0);
    }

    #[test]
    fn view_reports_emptiness_only_inside_lattice() {
        let mut cells = vec![None; 4];
        cells[1] = TokenKind::new(3);
        let view = OccupancyView::new(&cells, 2, 2);

        assert!(view.is_empty(CellId::new(0)));
        assert!(!view.is_empty(CellId::new(1)));
        assert!(!view.is_empty(CellId::new(4)));
        assert_eq!(view.token_at(CellId::new(1)), TokenKind::new(3));
    }
}
