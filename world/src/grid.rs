//! Rectangular cell lattice with per-cell walkability.

use egg_merge_core::{CellCoord, CellId, GridError, MoveSet, Neighbors};

/// Static description of the board lattice.
///
/// The shape is fixed at construction; only walkability changes afterwards.
/// Identifiers are row-major, so `id = row * columns + column`.
#[derive(Clone, Debug)]
pub struct Grid {
    rows: u32,
    columns: u32,
    cell_size: f32,
    walkable: Vec<bool>,
}

impl Grid {
    /// Creates a lattice in which every cell is walkable.
    #[must_use]
    pub fn new(rows: u32, columns: u32, cell_size: f32) -> Self {
        let capacity_u64 = u64::from(rows) * u64::from(columns);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        Self {
            rows,
            columns,
            cell_size,
            walkable: vec![true; capacity],
        }
    }

    /// Number of rows contained in the lattice.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of columns contained in the lattice.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Edge length of a square cell in world units.
    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Total number of cells.
    #[must_use]
    pub fn cell_count(&self) -> u32 {
        self.rows.saturating_mul(self.columns)
    }

    /// Reports whether the coordinate lies inside the lattice.
    #[must_use]
    pub const fn contains(&self, coord: CellCoord) -> bool {
        coord.row() < self.rows && coord.column() < self.columns
    }

    /// Converts a coordinate into its linear identifier.
    pub fn cell_id(&self, coord: CellCoord) -> Result<CellId, GridError> {
        if !self.contains(coord) {
            let (row, column) = (i64::from(coord.row()), i64::from(coord.column()));
            return Err(self.invalid_coordinate(row, column));
        }
        Ok(CellId::new(coord.row() * self.columns + coord.column()))
    }

    /// Converts a linear identifier back into its coordinate.
    pub fn coord(&self, cell: CellId) -> Result<CellCoord, GridError> {
        self.check(cell)?;
        Ok(CellCoord::new(
            cell.get() / self.columns,
            cell.get() % self.columns,
        ))
    }

    /// Marks a cell as passable or blocked.
    pub fn set_walkable(&mut self, cell: CellId, walkable: bool) -> Result<(), GridError> {
        self.check(cell)?;
        self.walkable[cell.index()] = walkable;
        Ok(())
    }

    /// Reports whether a path may cross the cell.
    pub fn is_walkable(&self, cell: CellId) -> Result<bool, GridError> {
        self.check(cell)?;
        Ok(self.walkable[cell.index()])
    }

    /// Walkability lookup by signed coordinates; anything outside the lattice is blocked.
    pub(crate) fn walkable_at(&self, row: i64, column: i64) -> bool {
        match self.index_of(row, column) {
            Some(index) => self.walkable[index],
            None => false,
        }
    }

    pub(crate) fn index_of(&self, row: i64, column: i64) -> Option<usize> {
        let (rows, columns) = (i64::from(self.rows), i64::from(self.columns));
        if row < 0 || column < 0 || row >= rows || column >= columns {
            return None;
        }
        usize::try_from(row * columns + column).ok()
    }

    /// Up to four edge-sharing neighbours, in the four-way direction order.
    pub fn neighbors4(&self, cell: CellId) -> Result<Neighbors, GridError> {
        self.neighbors_with(cell, MoveSet::Four)
    }

    /// Up to eight surrounding neighbours, in the eight-way direction order.
    pub fn neighbors8(&self, cell: CellId) -> Result<Neighbors, GridError> {
        self.neighbors_with(cell, MoveSet::Eight)
    }

    fn neighbors_with(&self, cell: CellId, move_set: MoveSet) -> Result<Neighbors, GridError> {
        let coord = self.coord(cell)?;
        let mut neighbors = Neighbors::default();
        for &(row_delta, column_delta) in move_set.offsets() {
            let row = i64::from(coord.row()) + i64::from(row_delta);
            let column = i64::from(coord.column()) + i64::from(column_delta);
            if let Some(index) = self.index_of(row, column) {
                neighbors.push(CellId::new(u32::try_from(index).unwrap_or(u32::MAX)));
            }
        }
        Ok(neighbors)
    }

    /// Top-left corner of the cell in world units, as `(x, y)`.
    #[must_use]
    pub fn cell_origin(&self, coord: CellCoord) -> (f32, f32) {
        (
            coord.column() as f32 * self.cell_size,
            coord.row() as f32 * self.cell_size,
        )
    }

    /// Centre of the cell in world units, as `(x, y)`.
    #[must_use]
    pub fn cell_center(&self, coord: CellCoord) -> (f32, f32) {
        let (x, y) = self.cell_origin(coord);
        let half = self.cell_size / 2.0;
        (x + half, y + half)
    }

    /// Cell containing the world-space point, if any.
    #[must_use]
    pub fn coord_at_position(&self, x: f32, y: f32) -> Option<CellCoord> {
        if self.cell_size <= 0.0 || x < 0.0 || y < 0.0 {
            return None;
        }
        let row = (y / self.cell_size).floor() as u32;
        let column = (x / self.cell_size).floor() as u32;
        let coord = CellCoord::new(row, column);
        self.contains(coord).then_some(coord)
    }

    fn check(&self, cell: CellId) -> Result<(), GridError> {
        if cell.get() < self.cell_count() {
            Ok(())
        } else {
            Err(GridError::InvalidCellId {
                cell: cell.get(),
                cell_count: self.cell_count(),
            })
        }
    }

    pub(crate) fn invalid_coordinate(&self, row: i64, column: i64) -> GridError {
        GridError::InvalidCoordinate {
            row,
            column,
            rows: self.rows,
            columns: self.columns,
        }
    }
}
