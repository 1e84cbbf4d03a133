#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative board state for Egg Merge.
//!
//! The board is the single owner of cell occupancy. Callers mutate it by
//! submitting [`Command`] values to [`apply`] and observe the outcome through
//! the emitted [`Event`] values or the read-only [`query`] functions.

mod grid;
mod pathfinder;

use std::collections::BTreeSet;

use egg_merge_core::{
    CellId, Command, Event, GridError, MoveError, MoveSet, Neighbors, PathStep, TokenHandle,
    TokenKind, DEFAULT_CELL_SIZE, DEFAULT_COLUMNS, DEFAULT_ROWS,
};
use tracing::debug;

pub use grid::Grid;
pub use pathfinder::PathFinder;

/// Occupancy of every cell plus the path finders that move tokens around.
///
/// Invariant: every valid cell id is in exactly one of the empty and occupied
/// sets, and a cell is walkable exactly when it is empty.
#[derive(Debug)]
pub struct Board {
    grid: Grid,
    tokens: Vec<Option<TokenKind>>,
    handles: Vec<Option<TokenHandle>>,
    empty: BTreeSet<CellId>,
    occupied: BTreeSet<CellId>,
    move_set: MoveSet,
    four_way: PathFinder,
    eight_way: PathFinder,
}

impl Board {
    /// Creates the default 8x6 board with four-way movement.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dimensions(
            DEFAULT_ROWS,
            DEFAULT_COLUMNS,
            DEFAULT_CELL_SIZE,
            MoveSet::Four,
        )
    }

    /// Creates an empty board with the provided shape.
    #[must_use]
    pub fn with_dimensions(rows: u32, columns: u32, cell_size: f32, move_set: MoveSet) -> Self {
        let grid = Grid::new(rows, columns, cell_size);
        let count = usize::try_from(grid.cell_count()).unwrap_or(0);
        let empty = (0..grid.cell_count()).map(CellId::new).collect();

        let mut four_way = PathFinder::new(MoveSet::Four);
        let mut eight_way = PathFinder::new(MoveSet::Eight);
        four_way.init(&grid);
        eight_way.init(&grid);

        Self {
            grid,
            tokens: vec![None; count],
            handles: vec![None; count],
            empty,
            occupied: BTreeSet::new(),
            move_set,
            four_way,
            eight_way,
        }
    }

    /// Occupies an empty cell. Reserving an occupied cell leaves it untouched.
    pub fn reserve(&mut self, cell: CellId, kind: TokenKind) -> Result<(), GridError> {
        if let Err(error) = self.grid.set_walkable(cell, false) {
            debug!(cell = cell.get(), "reserve rejected: invalid cell");
            return Err(error);
        }

        if let Some(existing) = self.tokens[cell.index()] {
            debug!(
                cell = cell.get(),
                existing = existing.rank(),
                requested = kind.rank(),
                "reserve ignored: cell already occupied"
            );
            return Ok(());
        }

        self.tokens[cell.index()] = Some(kind);
        let _ = self.empty.remove(&cell);
        let _ = self.occupied.insert(cell);
        Ok(())
    }

    /// Empties a cell and drops its renderer handle. Releasing an empty cell is a no-op.
    pub fn release(&mut self, cell: CellId) -> Result<(), GridError> {
        self.grid.set_walkable(cell, true)?;
        if self.tokens[cell.index()].take().is_some() {
            self.handles[cell.index()] = None;
            let _ = self.occupied.remove(&cell);
            let _ = self.empty.insert(cell);
        }
        Ok(())
    }

    /// Changes the rank of the token on an occupied cell. Empty cells are left empty.
    pub fn set_kind(&mut self, cell: CellId, kind: TokenKind) -> Result<(), GridError> {
        let _ = self.grid.coord(cell)?;
        if let Some(slot) = self.tokens[cell.index()].as_mut() {
            *slot = kind;
        }
        Ok(())
    }

    /// Associates an opaque renderer handle with a cell.
    pub fn attach_handle(&mut self, cell: CellId, handle: TokenHandle) -> Result<(), GridError> {
        let _ = self.grid.coord(cell)?;
        self.handles[cell.index()] = Some(handle);
        Ok(())
    }

    /// Renderer handle attached to the cell, if any.
    #[must_use]
    pub fn handle(&self, cell: CellId) -> Option<TokenHandle> {
        self.handles.get(cell.index()).copied().flatten()
    }

    /// Token occupying the cell, if any.
    #[must_use]
    pub fn token_at(&self, cell: CellId) -> Option<TokenKind> {
        self.tokens.get(cell.index()).copied().flatten()
    }

    /// Ids of every empty cell in ascending order.
    #[must_use]
    pub fn empty_cell_ids(&self) -> &BTreeSet<CellId> {
        &self.empty
    }

    /// Ids of every occupied cell in ascending order.
    #[must_use]
    pub fn occupied_cell_ids(&self) -> &BTreeSet<CellId> {
        &self.occupied
    }

    /// Edge-sharing neighbours ordered up, down, left, right.
    pub fn adjacent4(&self, cell: CellId) -> Result<Neighbors, GridError> {
        let _ = self.grid.coord(cell)?;
        Ok(self.view().adjacent4(cell))
    }

    /// Reports whether no empty cell remains.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.empty.is_empty()
    }

    /// Lattice description shared with the path finders.
    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Direction mode used for token movement.
    #[must_use]
    pub const fn move_set(&self) -> MoveSet {
        self.move_set
    }

    /// Shortest route between two cells using the active move set.
    pub fn find_path(&mut self, from: CellId, to: CellId) -> Result<Vec<PathStep>, GridError> {
        self.find_path_with(self.move_set, from, to)
    }

    /// Shortest route between two cells using an explicit move set.
    pub fn find_path_with(
        &mut self,
        move_set: MoveSet,
        from: CellId,
        to: CellId,
    ) -> Result<Vec<PathStep>, GridError> {
        let start = self.grid.coord(from)?;
        let goal = self.grid.coord(to)?;
        let finder = match move_set {
            MoveSet::Four => &mut self.four_way,
            MoveSet::Eight => &mut self.eight_way,
        };
        finder.search(&self.grid, start, goal)
    }

    fn view(&self) -> egg_merge_core::OccupancyView<'_> {
        egg_merge_core::OccupancyView::new(&self.tokens, self.grid.rows(), self.grid.columns())
    }

    fn move_token(
        &mut self,
        from: CellId,
        to: CellId,
    ) -> Result<(TokenKind, Vec<PathStep>), MoveError> {
        let cell_count = self.grid.cell_count();
        if from.get() >= cell_count || to.get() >= cell_count {
            return Err(MoveError::InvalidCell);
        }
        let kind = self.token_at(from).ok_or(MoveError::SourceEmpty)?;
        if self.token_at(to).is_some() {
            return Err(MoveError::TargetOccupied);
        }

        let path = self
            .find_path(from, to)
            .map_err(|_| MoveError::InvalidCell)?;
        if path.is_empty() {
            return Err(MoveError::NoPath);
        }

        let handle = self.handle(from);
        self.release(from).map_err(|_| MoveError::InvalidCell)?;
        self.reserve(to, kind).map_err(|_| MoveError::InvalidCell)?;
        self.handles[to.index()] = handle;
        Ok((kind, path))
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the board, mutating state deterministically.
pub fn apply(board: &mut Board, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureBoard {
            rows,
            columns,
            cell_size,
            move_set,
        } => {
            *board = Board::with_dimensions(rows, columns, cell_size, move_set);
            out_events.push(Event::BoardConfigured {
                rows,
                columns,
                move_set,
            });
        }
        Command::PlaceToken { cell, kind } => {
            if cell.get() >= board.grid.cell_count() || board.token_at(cell).is_some() {
                debug!(cell = cell.get(), "place ignored");
                return;
            }
            if board.reserve(cell, kind).is_ok() {
                out_events.push(Event::TokenPlaced { cell, kind });
            }
        }
        Command::RemoveToken { cell } => {
            if let Some(kind) = board.token_at(cell) {
                if board.release(cell).is_ok() {
                    out_events.push(Event::TokenRemoved { cell, kind });
                }
            }
        }
        Command::MoveToken { from, to } => match board.move_token(from, to) {
            Ok((kind, path)) => out_events.push(Event::TokenMoved {
                from,
                to,
                kind,
                path,
            }),
            Err(reason) => {
                debug!(
                    from = from.get(),
                    to = to.get(),
                    ?reason,
                    "move rejected"
                );
                out_events.push(Event::MoveRejected { from, to, reason });
            }
        },
        Command::PromoteToken { cell, kind } => {
            if let Some(previous) = board.token_at(cell) {
                if board.set_kind(cell, kind).is_ok() {
                    out_events.push(Event::TokenPromoted {
                        cell,
                        from: previous,
                        to: kind,
                    });
                }
            }
        }
    }
}

/// Query functions that provide read-only access to the board state.
pub mod query {
    use egg_merge_core::{CellId, MoveSet, OccupancyView, TokenKind};

    use super::{Board, Grid};

    /// Captures a read-only view of the occupancy of every cell.
    #[must_use]
    pub fn occupancy_view(board: &Board) -> OccupancyView<'_> {
        board.view()
    }

    /// Ids of every empty cell in ascending order.
    #[must_use]
    pub fn empty_cell_ids(board: &Board) -> Vec<CellId> {
        board.empty.iter().copied().collect()
    }

    /// Ids of every occupied cell in ascending order.
    #[must_use]
    pub fn occupied_cell_ids(board: &Board) -> Vec<CellId> {
        board.occupied.iter().copied().collect()
    }

    /// Token occupying the cell, if any.
    #[must_use]
    pub fn token_at(board: &Board, cell: CellId) -> Option<TokenKind> {
        board.token_at(cell)
    }

    /// Provides read-only access to the board lattice.
    #[must_use]
    pub fn grid(board: &Board) -> &Grid {
        &board.grid
    }

    /// Direction mode used for token movement.
    #[must_use]
    pub fn move_set(board: &Board) -> MoveSet {
        board.move_set
    }

    /// Occupied cells paired with their tokens, in id order.
    #[must_use]
    pub fn tokens(board: &Board) -> Vec<(CellId, TokenKind)> {
        board
            .occupied
            .iter()
            .filter_map(|&cell| board.token_at(cell).map(|kind| (cell, kind)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egg_merge_core::CellCoord;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn kind(rank: u8) -> TokenKind {
        TokenKind::new(rank).expect("rank within range")
    }

    fn assert_partition(board: &Board) {
        let count = board.grid().cell_count();
        for id in 0..count {
            let cell = CellId::new(id);
            let empty = board.empty_cell_ids().contains(&cell);
            let occupied = board.occupied_cell_ids().contains(&cell);
            assert!(empty ^ occupied, "cell {id} must be in exactly one set");
            assert_eq!(board.token_at(cell).is_some(), occupied);
            assert_eq!(board.grid().is_walkable(cell), Ok(empty));
        }
    }

    #[test]
    fn new_board_is_entirely_empty() {
        let board = Board::new();
        assert_eq!(board.empty_cell_ids().len(), 48);
        assert!(board.occupied_cell_ids().is_empty());
        assert!(!board.is_full());
        assert_partition(&board);
    }

    #[test]
    fn reserve_and_release_keep_sets_disjoint() {
        let mut board = Board::new();
        board.reserve(CellId::new(7), kind(2)).expect("valid cell");
        board.reserve(CellId::new(7), kind(5)).expect("valid cell");
        assert_eq!(board.token_at(CellId::new(7)), Some(kind(2)));
        assert_partition(&board);

        board
            .attach_handle(CellId::new(7), TokenHandle::new(99))
            .expect("valid cell");
        board.release(CellId::new(7)).expect("valid cell");
        board.release(CellId::new(7)).expect("valid cell");
        assert_eq!(board.handle(CellId::new(7)), None);
        assert_partition(&board);
    }

    #[test]
    fn random_operation_sequences_preserve_partition() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x0e66);
        let mut board = Board::with_dimensions(5, 4, 1.0, MoveSet::Eight);
        let count = board.grid().cell_count();
        let mut events = Vec::new();

        for _ in 0..5_000 {
            let cell = CellId::new(rng.gen_range(0..count));
            let kind = kind(rng.gen_range(0..=TokenKind::MAX.rank()));
            match rng.gen_range(0..5) {
                0 => board.reserve(cell, kind).expect("valid cell"),
                1 => board.release(cell).expect("valid cell"),
                op => {
                    let command = match op {
                        2 => Command::MoveToken {
                            from: cell,
                            to: CellId::new(rng.gen_range(0..count)),
                        },
                        3 => Command::PlaceToken { cell, kind },
                        _ => Command::PromoteToken { cell, kind },
                    };
                    apply(&mut board, command, &mut events);
                }
            }
            assert_partition(&board);
            events.clear();
        }
    }

    #[test]
    fn invalid_ids_are_reported() {
        let mut board = Board::new();
        assert!(board.reserve(CellId::new(48), kind(0)).is_err());
        assert!(board.release(CellId::new(48)).is_err());
        assert!(board.adjacent4(CellId::new(48)).is_err());
        assert!(board.find_path(CellId::new(0), CellId::new(48)).is_err());
        assert_partition(&board);
    }

    #[test]
    fn full_board_reports_full() {
        let mut board = Board::with_dimensions(2, 2, 1.0, MoveSet::Four);
        for id in 0..4 {
            board.reserve(CellId::new(id), kind(0)).expect("valid cell");
        }
        assert!(board.is_full());
        assert!(query::empty_cell_ids(&board).is_empty());
    }

    #[test]
    fn move_carries_kind_and_handle() {
        let mut board = Board::new();
        let mut events = Vec::new();
        board.reserve(CellId::new(0), kind(3)).expect("valid cell");
        board
            .attach_handle(CellId::new(0), TokenHandle::new(5))
            .expect("valid cell");

        apply(
            &mut board,
            Command::MoveToken {
                from: CellId::new(0),
                to: CellId::new(2),
            },
            &mut events,
        );

        match events.as_slice() {
            [Event::TokenMoved {
                from,
                to,
                kind: moved,
                path,
            }] => {
                assert_eq!(
                    (*from, *to, *moved),
                    (CellId::new(0), CellId::new(2), kind(3))
                );
                assert_eq!(
                    path.last().map(|step| step.cell),
                    Some(CellCoord::new(0, 2))
                );
                assert_eq!(path.len(), 2);
            }
            other => panic!("unexpected events: {other:?}"),
        }
        assert_eq!(board.token_at(CellId::new(0)), None);
        assert_eq!(board.token_at(CellId::new(2)), Some(kind(3)));
        assert_eq!(board.handle(CellId::new(2)), Some(TokenHandle::new(5)));
        assert_partition(&board);
    }

    #[test]
    fn rejected_moves_leave_board_untouched() {
        let mut board = Board::new();
        let mut events = Vec::new();
        // Cell 0 walled in by its two neighbours.
        for (id, rank) in [(0, 1), (1, 2), (6, 2), (20, 0)] {
            board
                .reserve(CellId::new(id), kind(rank))
                .expect("valid cell");
        }

        for (from, to) in [(3, 4), (1, 6), (20, 0), (20, 99)] {
            apply(
                &mut board,
                Command::MoveToken {
                    from: CellId::new(from),
                    to: CellId::new(to),
                },
                &mut events,
            );
        }
        board.release(CellId::new(0)).expect("valid cell");
        apply(
            &mut board,
            Command::MoveToken {
                from: CellId::new(20),
                to: CellId::new(0),
            },
            &mut events,
        );

        let reasons: Vec<MoveError> = events
            .iter()
            .filter_map(|event| match event {
                Event::MoveRejected { reason, .. } => Some(*reason),
                _ => None,
            })
            .collect();
        assert_eq!(
            reasons,
            vec![
                MoveError::SourceEmpty,
                MoveError::TargetOccupied,
                MoveError::TargetOccupied,
                MoveError::InvalidCell,
                MoveError::NoPath,
            ]
        );
        assert_eq!(board.token_at(CellId::new(20)), Some(kind(0)));
        assert_partition(&board);
    }

    #[test]
    fn place_remove_and_promote_emit_events() {
        let mut board = Board::new();
        let mut events = Vec::new();
        let cell = CellId::new(14);

        for command in [
            Command::PlaceToken {
                cell,
                kind: kind(1),
            },
            Command::PlaceToken {
                cell,
                kind: kind(4),
            },
            Command::PromoteToken {
                cell,
                kind: kind(2),
            },
            Command::RemoveToken { cell },
            Command::RemoveToken { cell },
            Command::PlaceToken {
                cell: CellId::new(480),
                kind: kind(0),
            },
        ] {
            apply(&mut board, command, &mut events);
        }

        assert_eq!(
            events,
            vec![
                Event::TokenPlaced {
                    cell,
                    kind: kind(1)
                },
                Event::TokenPromoted {
                    cell,
                    from: kind(1),
                    to: kind(2)
                },
                Event::TokenRemoved {
                    cell,
                    kind: kind(2)
                },
            ]
        );
        assert_partition(&board);
    }

    #[test]
    fn configure_rebuilds_an_empty_board() {
        let mut board = Board::new();
        let mut events = Vec::new();
        board.reserve(CellId::new(3), kind(0)).expect("valid cell");

        apply(
            &mut board,
            Command::ConfigureBoard {
                rows: 4,
                columns: 5,
                cell_size: 32.0,
                move_set: MoveSet::Eight,
            },
            &mut events,
        );

        assert_eq!(
            events,
            vec![Event::BoardConfigured {
                rows: 4,
                columns: 5,
                move_set: MoveSet::Eight
            }]
        );
        assert_eq!(query::move_set(&board), MoveSet::Eight);
        assert_eq!(query::grid(&board).cell_count(), 20);
        assert!(query::occupied_cell_ids(&board).is_empty());
        assert_partition(&board);
    }

    #[test]
    fn query_tokens_lists_cells_in_id_order() {
        let mut board = Board::new();
        for (id, rank) in [(30, 2), (4, 0), (17, 6)] {
            board
                .reserve(CellId::new(id), kind(rank))
                .expect("valid cell");
        }
        assert_eq!(
            query::tokens(&board),
            vec![
                (CellId::new(4), kind(0)),
                (CellId::new(17), kind(6)),
                (CellId::new(30), kind(2)),
            ]
        );
        let view = query::occupancy_view(&board);
        assert_eq!(view.token_at(CellId::new(17)), Some(kind(6)));
        assert!(view.is_empty(CellId::new(18)));
    }

    #[test]
    fn occupied_cells_block_routes() {
        let mut board = Board::new();
        for column in 0..6 {
            if column != 5 {
                board
                    .reserve(CellId::new(2 * 6 + column), kind(0))
                    .expect("valid cell");
            }
        }
        let path = board
            .find_path(CellId::new(0), CellId::new(24))
            .expect("valid cells");
        assert!(path.iter().any(|step| step.cell == CellCoord::new(2, 5)));

        let diagonal = board
            .find_path_with(MoveSet::Eight, CellId::new(0), CellId::new(24))
            .expect("valid cells");
        assert!(diagonal.len() < path.len());
    }
}
