//! Scripted tutorial layouts for first-time players.

use egg_merge_core::{CellId, TokenKind};

/// Number of scripted steps in each tutorial level.
pub const GUIDE_STEPS_PER_LEVEL: u32 = 7;

const NO_HINT: i32 = -1;

/// Board layout and hint for one tutorial step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuideStep {
    token_cells: &'static [u32],
    token_kinds: &'static [u8],
    hint_cells: &'static [i32],
}

impl GuideStep {
    /// Tokens to lay out, pairing cells with kinds. Surplus kinds are dropped.
    pub fn placements(&self) -> impl Iterator<Item = (CellId, TokenKind)> + '_ {
        self.token_cells
            .iter()
            .zip(self.token_kinds)
            .filter_map(|(&cell, &rank)| Some((CellId::new(cell), TokenKind::new(rank)?)))
    }

    /// Cells to highlight, usually the token to pick and where to drop it.
    #[must_use]
    pub fn hints(&self) -> Vec<CellId> {
        self.hint_cells
            .iter()
            .filter(|&&cell| cell != NO_HINT)
            .filter_map(|&cell| u32::try_from(cell).ok())
            .map(CellId::new)
            .collect()
    }
}

const LEVEL_ZERO: [GuideStep; 7] = [
    GuideStep {
        token_cells: &[0, 44, 45],
        token_kinds: &[0, 0, 0],
        hint_cells: &[0, 43],
    },
    GuideStep {
        token_cells: &[14, 3, 18],
        token_kinds: &[0, 0, 1],
        hint_cells: &[3, 33],
    },
    GuideStep {
        token_cells: &[3, 32, 17],
        token_kinds: &[3, 2, 2],
        hint_cells: &[32, 23],
    },
    GuideStep {
        token_cells: &[16, 26, 30],
        token_kinds: &[2, 2, 3],
        hint_cells: &[11, 24],
    },
    GuideStep {
        token_cells: &[8, 10, 22],
        token_kinds: &[2, 2, 3, 1],
        hint_cells: &[NO_HINT],
    },
    GuideStep {
        token_cells: &[2, 4, 23],
        token_kinds: &[4, 2, 3],
        hint_cells: &[NO_HINT],
    },
    GuideStep {
        token_cells: &[1, 12, 16],
        token_kinds: &[4, 3, 1],
        hint_cells: &[NO_HINT],
    },
];

/// Scripted layout for a tutorial stage, if one exists.
#[must_use]
pub fn guide_step(level: u32, step: u32) -> Option<&'static GuideStep> {
    if level != 0 || step == 0 {
        return None;
    }
    LEVEL_ZERO.get(usize::try_from(step - 1).ok()?)
}

/// Stage that follows `(level, step)`.
///
/// Steps simply count up; new players roll into the next level once the
/// tutorial's last step is done.
#[must_use]
pub const fn next_stage(level: u32, step: u32, is_new_user: bool) -> (u32, u32) {
    let next_step = step.saturating_add(1);
    if is_new_user && next_step > GUIDE_STEPS_PER_LEVEL {
        (level.saturating_add(1), 1)
    } else {
        (level, next_step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_teaches_a_three_way_merge() {
        let step = guide_step(0, 1).expect("scripted");
        let placements: Vec<(u32, u8)> = step
            .placements()
            .map(|(cell, kind)| (cell.get(), kind.rank()))
            .collect();
        assert_eq!(placements, vec![(0, 0), (44, 0), (45, 0)]);
        assert_eq!(step.hints(), vec![CellId::new(0), CellId::new(43)]);
    }

    #[test]
    fn surplus_kinds_and_sentinel_hints_are_dropped() {
        let step = guide_step(0, 5).expect("scripted");
        assert_eq!(step.placements().count(), 3);
        assert!(step.hints().is_empty());
    }

    #[test]
    fn unscripted_stages_have_no_guide() {
        assert!(guide_step(0, 0).is_none());
        assert!(guide_step(0, 8).is_none());
        assert!(guide_step(1, 1).is_none());
    }

    #[test]
    fn new_players_roll_over_after_the_tutorial() {
        assert_eq!(next_stage(0, 3, true), (0, 4));
        assert_eq!(next_stage(0, 7, true), (1, 1));
        assert_eq!(next_stage(0, 7, false), (0, 8));
    }
}
