//! Reusable A* search over the board lattice.

use egg_merge_core::{CellCoord, GridError, MoveSet, PathStep};
use tracing::trace;

use crate::grid::Grid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum NodeState {
    #[default]
    Unvisited,
    Open,
    Closed,
}

/// Scratch record for one lattice cell.
///
/// `prev`/`next` thread the node into the open list, which is kept sorted by
/// descending `f` so that the tail always carries the cheapest candidate.
#[derive(Clone, Copy, Debug, Default)]
struct SearchNode {
    g: u32,
    h: u32,
    f: u32,
    direction: u8,
    came_from: Option<usize>,
    state: NodeState,
    generation: u64,
    prev: Option<usize>,
    next: Option<usize>,
}

impl SearchNode {
    fn reset(&mut self) {
        *self = Self {
            generation: self.generation,
            ..Self::default()
        };
    }
}

/// A* path finder parameterised by its [`MoveSet`].
///
/// The node pool is allocated once per lattice shape and reused across
/// searches. A monotonically increasing generation tag marks which nodes were
/// touched by the current search, so stale scratch data from earlier searches
/// is ignored without clearing the pool. The eight-way variant additionally
/// sweeps every node before each search.
#[derive(Clone, Debug)]
pub struct PathFinder {
    move_set: MoveSet,
    rows: u32,
    columns: u32,
    nodes: Vec<SearchNode>,
    generation: u64,
    best: Option<usize>,
}

impl PathFinder {
    /// Creates an empty path finder; call [`PathFinder::init`] or search directly.
    #[must_use]
    pub fn new(move_set: MoveSet) -> Self {
        Self {
            move_set,
            rows: 0,
            columns: 0,
            nodes: Vec::new(),
            generation: 0,
            best: None,
        }
    }

    /// Direction mode this finder expands with.
    #[must_use]
    pub const fn move_set(&self) -> MoveSet {
        self.move_set
    }

    /// Sizes the node pool for the provided lattice. The pool only ever grows.
    pub fn init(&mut self, grid: &Grid) {
        let count = usize::try_from(grid.cell_count()).unwrap_or(0);
        self.rows = grid.rows();
        self.columns = grid.columns();
        if self.nodes.len() < count {
            self.nodes.resize(count, SearchNode::default());
        }
        self.best = None;
    }

    /// Finds a minimum-cost route between two cells.
    ///
    /// The returned steps exclude `start` and end with `goal`. An empty vector
    /// means either `start == goal` or that no walkable route exists.
    pub fn search(
        &mut self,
        grid: &Grid,
        start: CellCoord,
        goal: CellCoord,
    ) -> Result<Vec<PathStep>, GridError> {
        let start_id = grid.cell_id(start)?;
        let goal_id = grid.cell_id(goal)?;
        if start_id == goal_id {
            return Ok(Vec::new());
        }

        if self.rows != grid.rows() || self.columns != grid.columns() {
            self.init(grid);
        }

        let start_index = start_id.index();
        let goal_index = goal_id.index();
        self.begin(start_index, start.manhattan_distance(goal));

        let offsets = self.move_set.offsets();
        let mut expanded = 0_u32;
        let mut current = start_index;

        let found = loop {
            if current == goal_index {
                break true;
            }

            self.close(current);
            expanded += 1;

            let (row, column) = self.position(current);
            let base_cost = self.nodes[current].g;

            for (direction, &(row_delta, column_delta)) in offsets.iter().enumerate() {
                let neighbor_row = row + i64::from(row_delta);
                let neighbor_column = column + i64::from(column_delta);
                if !grid.walkable_at(neighbor_row, neighbor_column) {
                    continue;
                }
                let Some(index) = grid.index_of(neighbor_row, neighbor_column) else {
                    continue;
                };

                let direction = u8::try_from(direction).unwrap_or(u8::MAX);
                let cost = base_cost + self.move_set.step_cost(direction);
                let node = self.nodes[index];

                if node.generation != self.generation || node.state == NodeState::Unvisited {
                    let neighbor = CellCoord::new(
                        u32::try_from(neighbor_row).unwrap_or(0),
                        u32::try_from(neighbor_column).unwrap_or(0),
                    );
                    self.nodes[index] = SearchNode {
                        g: cost,
                        h: neighbor.manhattan_distance(goal),
                        f: 0,
                        direction,
                        came_from: Some(current),
                        state: NodeState::Unvisited,
                        generation: self.generation,
                        prev: None,
                        next: None,
                    };
                    self.open(index);
                } else if node.state == NodeState::Open && cost < node.g {
                    let entry = &mut self.nodes[index];
                    entry.g = cost;
                    entry.direction = direction;
                    entry.came_from = Some(current);
                    self.reopen(index);
                }
            }

            match self.best {
                Some(next) => current = next,
                None => break false,
            }
        };

        trace!(
            ?start,
            ?goal,
            move_set = ?self.move_set,
            expanded,
            found,
            "path search finished"
        );

        if !found {
            return Ok(Vec::new());
        }

        let mut steps = Vec::new();
        let mut cursor = goal_index;
        while let Some(parent) = self.nodes[cursor].came_from {
            let (row, column) = self.position(cursor);
            steps.push(PathStep {
                cell: CellCoord::new(
                    u32::try_from(row).unwrap_or(0),
                    u32::try_from(column).unwrap_or(0),
                ),
                direction: self.nodes[cursor].direction,
            });
            if parent == start_index {
                break;
            }
            cursor = parent;
        }
        steps.reverse();
        Ok(steps)
    }

    fn begin(&mut self, start_index: usize, heuristic: u32) {
        self.generation = self.generation.wrapping_add(1);
        self.best = None;

        if self.move_set.resets_eagerly() {
            for node in &mut self.nodes {
                node.reset();
            }
        }

        self.nodes[start_index] = SearchNode {
            g: 0,
            h: heuristic,
            f: heuristic,
            generation: self.generation,
            ..SearchNode::default()
        };
    }

    fn position(&self, index: usize) -> (i64, i64) {
        let columns = u64::from(self.columns.max(1));
        let index = index as u64;
        let row = i64::try_from(index / columns).unwrap_or(0);
        let column = i64::try_from(index % columns).unwrap_or(0);
        (row, column)
    }

    fn close(&mut self, index: usize) {
        if self.nodes[index].state == NodeState::Open {
            self.unlink(index);
        }
        self.nodes[index].state = NodeState::Closed;
    }

    /// Inserts a freshly discovered node; equal `f` values land nearer the tail.
    fn open(&mut self, index: usize) {
        let node = &mut self.nodes[index];
        node.state = NodeState::Open;
        node.f = node.g + node.h;
        let f = node.f;

        let Some(mut cursor) = self.best else {
            self.best = Some(index);
            return;
        };

        loop {
            if self.nodes[cursor].f >= f {
                break;
            }
            match self.nodes[cursor].prev {
                Some(prev) => cursor = prev,
                None => {
                    self.nodes[cursor].prev = Some(index);
                    self.nodes[index].prev = None;
                    self.nodes[index].next = Some(cursor);
                    return;
                }
            }
        }

        self.insert_after(cursor, index);
    }

    /// Moves an open node towards the tail after its `f` decreased.
    fn reopen(&mut self, index: usize) {
        let node = &mut self.nodes[index];
        node.f = node.g + node.h;
        let f = node.f;

        let Some(mut cursor) = node.next else {
            return;
        };
        if self.nodes[cursor].f <= f {
            return;
        }

        self.unlink(index);
        loop {
            if self.nodes[cursor].f <= f {
                self.insert_before(cursor, index);
                return;
            }
            match self.nodes[cursor].next {
                Some(next) => cursor = next,
                None => break,
            }
        }

        match self.best {
            Some(tail) => self.insert_after(tail, index),
            None => self.best = Some(index),
        }
    }

    fn unlink(&mut self, index: usize) {
        let SearchNode { prev, next, .. } = self.nodes[index];
        if let Some(prev) = prev {
            self.nodes[prev].next = next;
        }
        if let Some(next) = next {
            self.nodes[next].prev = prev;
        }
        if self.best == Some(index) {
            self.best = prev;
        }
        self.nodes[index].prev = None;
        self.nodes[index].next = None;
    }

    fn insert_after(&mut self, anchor: usize, index: usize) {
        let next = self.nodes[anchor].next;
        self.nodes[index].prev = Some(anchor);
        self.nodes[index].next = next;
        self.nodes[anchor].next = Some(index);
        match next {
            Some(next) => self.nodes[next].prev = Some(index),
            None => self.best = Some(index),
        }
    }

    fn insert_before(&mut self, anchor: usize, index: usize) {
        let prev = self.nodes[anchor].prev;
        self.nodes[index].next = Some(anchor);
        self.nodes[index].prev = prev;
        self.nodes[anchor].prev = Some(index);
        if let Some(prev) = prev {
            self.nodes[prev].next = Some(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;

    use egg_merge_core::CellId;

    use super::*;

    fn path_cost(move_set: MoveSet, steps: &[PathStep]) -> u32 {
        steps
            .iter()
            .map(|step| move_set.step_cost(step.direction))
            .sum()
    }

    fn dijkstra(grid: &Grid, move_set: MoveSet, start: CellCoord, goal: CellCoord) -> Option<u32> {
        let count = grid.cell_count() as usize;
        let mut distance = vec![u32::MAX; count];
        let start_index = grid.cell_id(start).expect("start").index();
        let goal_index = grid.cell_id(goal).expect("goal").index();
        distance[start_index] = 0;
        let mut heap = BinaryHeap::new();
        heap.push(Reverse((0_u32, start_index)));

        while let Some(Reverse((cost, index))) = heap.pop() {
            if index == goal_index {
                return Some(cost);
            }
            if cost > distance[index] {
                continue;
            }
            let row = (index as u32 / grid.columns()) as i64;
            let column = (index as u32 % grid.columns()) as i64;
            for (direction, &(dr, dc)) in move_set.offsets().iter().enumerate() {
                let (r, c) = (row + i64::from(dr), column + i64::from(dc));
                if !grid.walkable_at(r, c) {
                    continue;
                }
                let next = grid.index_of(r, c).expect("in bounds");
                let next_cost = cost + move_set.step_cost(direction as u8);
                if next_cost < distance[next] {
                    distance[next] = next_cost;
                    heap.push(Reverse((next_cost, next)));
                }
            }
        }
        None
    }

    fn assert_path_is_connected(
        grid: &Grid,
        move_set: MoveSet,
        start: CellCoord,
        goal: CellCoord,
        steps: &[PathStep],
    ) {
        let mut previous = start;
        for step in steps {
            let (dr, dc) = move_set.offsets()[usize::from(step.direction)];
            let row = i64::from(previous.row()) + i64::from(dr);
            let column = i64::from(previous.column()) + i64::from(dc);
            assert_eq!(
                (row, column),
                (i64::from(step.cell.row()), i64::from(step.cell.column())),
                "direction must describe the hop"
            );
            assert!(grid.walkable_at(row, column), "path crossed a wall");
            previous = step.cell;
        }
        assert_eq!(previous, goal, "path must end at the goal");
    }

    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            self.0 >> 33
        }
    }

    #[test]
    fn straight_corridor_is_walked_cell_by_cell() {
        let grid = Grid::new(8, 6, 150.0);
        let mut finder = PathFinder::new(MoveSet::Four);
        let steps = finder
            .search(&grid, CellCoord::new(0, 0), CellCoord::new(0, 3))
            .expect("valid cells");

        let cells: Vec<CellCoord> = steps.iter().map(|step| step.cell).collect();
        assert_eq!(
            cells,
            vec![
                CellCoord::new(0, 1),
                CellCoord::new(0, 2),
                CellCoord::new(0, 3)
            ]
        );
        assert!(steps.iter().all(|step| step.direction == 2));
    }

    #[test]
    fn same_cell_yields_empty_path() {
        let grid = Grid::new(8, 6, 150.0);
        let mut finder = PathFinder::new(MoveSet::Eight);
        let steps = finder
            .search(&grid, CellCoord::new(3, 3), CellCoord::new(3, 3))
            .expect("valid cells");
        assert!(steps.is_empty());
    }

    #[test]
    fn enclosed_goal_is_unreachable() {
        let mut grid = Grid::new(8, 6, 150.0);
        for id in [0_u32, 2, 7] {
            grid.set_walkable(CellId::new(id), false).expect("valid id");
        }
        let mut finder = PathFinder::new(MoveSet::Four);
        let steps = finder
            .search(&grid, CellCoord::new(4, 4), CellCoord::new(0, 1))
            .expect("valid cells");
        assert!(steps.is_empty());
    }

    #[test]
    fn diagonals_cut_corners_between_blocked_cells() {
        let mut grid = Grid::new(3, 3, 1.0);
        grid.set_walkable(CellId::new(1), false).expect("valid id");
        grid.set_walkable(CellId::new(3), false).expect("valid id");

        let mut eight = PathFinder::new(MoveSet::Eight);
        let steps = eight
            .search(&grid, CellCoord::new(0, 0), CellCoord::new(1, 1))
            .expect("valid cells");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].direction, 3);

        let mut four = PathFinder::new(MoveSet::Four);
        let steps = four
            .search(&grid, CellCoord::new(0, 0), CellCoord::new(1, 1))
            .expect("valid cells");
        assert!(steps.is_empty(), "four-way search cannot slip between walls");
    }

    #[test]
    fn out_of_range_endpoints_are_errors() {
        let grid = Grid::new(8, 6, 150.0);
        let mut finder = PathFinder::new(MoveSet::Four);
        assert!(finder
            .search(&grid, CellCoord::new(8, 0), CellCoord::new(0, 0))
            .is_err());
        assert!(finder
            .search(&grid, CellCoord::new(0, 0), CellCoord::new(0, 6))
            .is_err());
    }

    #[test]
    fn reuse_across_searches_does_not_leak_state() {
        let mut grid = Grid::new(8, 6, 150.0);
        let mut finder = PathFinder::new(MoveSet::Four);
        let first = finder
            .search(&grid, CellCoord::new(0, 0), CellCoord::new(7, 5))
            .expect("valid cells");
        assert_eq!(path_cost(MoveSet::Four, &first), 120);

        for column in 0..5 {
            grid.set_walkable(CellId::new(3 * 6 + column), false)
                .expect("valid id");
        }
        let second = finder
            .search(&grid, CellCoord::new(0, 0), CellCoord::new(7, 0))
            .expect("valid cells");
        assert_path_is_connected(
            &grid,
            MoveSet::Four,
            CellCoord::new(0, 0),
            CellCoord::new(7, 0),
            &second,
        );
        assert_eq!(path_cost(MoveSet::Four, &second), 170);
    }

    #[test]
    fn costs_match_dijkstra_on_random_layouts() {
        let mut rng = Lcg(0x5eed);
        let mut four = PathFinder::new(MoveSet::Four);
        let mut eight = PathFinder::new(MoveSet::Eight);

        for _ in 0..200 {
            let rows = 2 + (rng.next() % 7) as u32;
            let columns = 2 + (rng.next() % 5) as u32;
            let mut grid = Grid::new(rows, columns, 150.0);
            for id in 0..grid.cell_count() {
                if rng.next() % 10 < 3 {
                    grid.set_walkable(CellId::new(id), false).expect("valid id");
                }
            }

            let start_id = (rng.next() % u64::from(grid.cell_count())) as u32;
            let goal_id = (rng.next() % u64::from(grid.cell_count())) as u32;
            grid.set_walkable(CellId::new(goal_id), true)
                .expect("valid id");
            let start = grid.coord(CellId::new(start_id)).expect("valid id");
            let goal = grid.coord(CellId::new(goal_id)).expect("valid id");

            for (finder, move_set) in [(&mut four, MoveSet::Four), (&mut eight, MoveSet::Eight)] {
                let steps = finder.search(&grid, start, goal).expect("valid cells");
                let expected = dijkstra(&grid, move_set, start, goal);
                if start == goal {
                    assert!(steps.is_empty());
                    continue;
                }
                match expected {
                    Some(cost) => {
                        assert_path_is_connected(&grid, move_set, start, goal, &steps);
                        assert_eq!(
                            path_cost(move_set, &steps),
                            cost,
                            "{move_set:?} route from {start:?} to {goal:?} is not optimal"
                        );
                    }
                    None => assert!(steps.is_empty(), "found a path Dijkstra could not"),
                }
            }
        }
    }
}
