#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Match detection and promotion rules for connected groups of equal tokens.

use std::collections::{BTreeSet, VecDeque};

use egg_merge_core::{CellId, Command, OccupancyView, TokenKind};
use tracing::debug;

/// Smallest connected group that merges.
pub const MIN_GROUP_SIZE: usize = 3;

const BASE_SCORE: u32 = 10;
const SCORE_PER_RANK: u32 = 5;
const SCORE_PER_EXTRA_MEMBER: u32 = 5;

/// A connected group of equal tokens large enough to merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchGroup {
    members: Vec<CellId>,
    kind: TokenKind,
    promoted_kind: TokenKind,
    score: u32,
}

impl MatchGroup {
    /// Cells of the group in breadth-first order, starting with the searched cell.
    #[must_use]
    pub fn members(&self) -> &[CellId] {
        &self.members
    }

    /// Rank shared by every member.
    #[must_use]
    pub const fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Rank the surviving token is promoted to.
    #[must_use]
    pub const fn promoted_kind(&self) -> TokenKind {
        self.promoted_kind
    }

    /// Points awarded for the merge.
    #[must_use]
    pub const fn score(&self) -> u32 {
        self.score
    }

    /// Members that disappear when the group collapses into `destination`.
    #[must_use]
    pub fn cells_to_clear(&self, destination: CellId) -> Vec<CellId> {
        self.members
            .iter()
            .copied()
            .filter(|&cell| cell != destination)
            .collect()
    }

    /// Emits the board commands that collapse the group into `destination`.
    pub fn collapse_into(&self, destination: CellId, out: &mut Vec<Command>) {
        for cell in self.cells_to_clear(destination) {
            out.push(Command::RemoveToken { cell });
        }
        out.push(Command::PromoteToken {
            cell: destination,
            kind: self.promoted_kind,
        });
    }
}

/// Score of merging `member_count` tokens of the given rank.
#[must_use]
pub fn synthesis_score(kind: TokenKind, member_count: usize) -> u32 {
    let extra = u32::try_from(member_count.saturating_sub(MIN_GROUP_SIZE))
        .unwrap_or(u32::MAX);
    BASE_SCORE
        + (u32::from(kind.rank()) + 1) * SCORE_PER_RANK
        + extra.saturating_mul(SCORE_PER_EXTRA_MEMBER)
}

/// Finds the qualifying group of equal tokens connected to `cell`.
///
/// Returns `None` when the cell is empty or the connected group has fewer
/// than [`MIN_GROUP_SIZE`] members.
#[must_use]
pub fn find_match_group(cell: CellId, view: &OccupancyView<'_>) -> Option<MatchGroup> {
    let kind = view.token_at(cell)?;
    let mut visited = BTreeSet::from([cell]);
    let mut queue = VecDeque::from([cell]);
    let mut members = Vec::new();

    while let Some(current) = queue.pop_front() {
        members.push(current);
        for neighbor in view.adjacent4(current) {
            if view.token_at(neighbor) == Some(kind) && visited.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }

    if members.len() < MIN_GROUP_SIZE {
        return None;
    }

    let score = synthesis_score(kind, members.len());
    debug!(
        cell = cell.get(),
        kind = kind.rank(),
        members = members.len(),
        score,
        "match group found"
    );
    Some(MatchGroup {
        members,
        kind,
        promoted_kind: kind.promoted(),
        score,
    })
}
