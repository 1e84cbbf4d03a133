#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Click-driven selection state machine that turns taps into board moves.

use egg_merge_core::{CellId, Command, Event, MoveError, PathStep, TokenKind};
use egg_merge_system_synthesis::{find_match_group, MatchGroup};
use egg_merge_world::{self as world, query, Board};
use tracing::debug;

/// Currently selected token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    /// Cell holding the selected token.
    pub cell: CellId,
    /// Rank of the selected token at the time it was picked.
    pub kind: TokenKind,
}

/// Outcome of a single click, suitable for driving a presentation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionIntent {
    /// An occupied cell was picked while nothing was selected.
    Select {
        /// Newly selected cell.
        cell: CellId,
        /// Rank of the selected token.
        kind: TokenKind,
    },
    /// The selected cell was clicked again and the selection dropped.
    Cancel {
        /// Cell that was deselected.
        cell: CellId,
    },
    /// Another occupied cell replaced the current selection.
    Swap {
        /// Previously selected cell.
        previous: CellId,
        /// Newly selected cell.
        current: CellId,
        /// Rank of the newly selected token.
        kind: TokenKind,
    },
    /// The move to an empty cell failed; the selection is kept.
    InvalidMove {
        /// Selected origin cell.
        from: CellId,
        /// Clicked destination cell.
        to: CellId,
        /// Reason reported by the board.
        reason: MoveError,
    },
    /// The selected token walked to the clicked cell.
    Moved {
        /// Origin cell, now empty.
        from: CellId,
        /// Destination cell.
        to: CellId,
        /// Rank of the token before any merge.
        kind: TokenKind,
        /// Steps walked, ending at `to`.
        path: Vec<PathStep>,
        /// Group collapsed into `to`, if the move completed one.
        merge: Option<MatchGroup>,
    },
    /// An empty cell or an unknown id was clicked with nothing selected.
    Ignored {
        /// Clicked cell.
        cell: CellId,
    },
}

/// Tracks the selected token across clicks.
#[derive(Debug, Default)]
pub struct SelectionController {
    selection: Option<Selection>,
    events: Vec<Event>,
    commands: Vec<Command>,
}

impl SelectionController {
    /// Creates a controller with nothing selected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current selection, if any.
    #[must_use]
    pub const fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Drops the current selection.
    pub fn clear(&mut self) {
        self.selection = None;
    }

    /// Advances the state machine for a click on `cell`.
    ///
    /// Successful moves are applied to the board together with any merge they
    /// trigger; every other outcome leaves the board untouched.
    pub fn on_cell_clicked(&mut self, board: &mut Board, cell: CellId) -> SelectionIntent {
        let clicked = query::token_at(board, cell);

        let Some(selected) = self.selection else {
            return match clicked {
                Some(kind) => {
                    self.selection = Some(Selection { cell, kind });
                    SelectionIntent::Select { cell, kind }
                }
                None => SelectionIntent::Ignored { cell },
            };
        };

        match clicked {
            Some(_) if selected.cell == cell => {
                self.selection = None;
                SelectionIntent::Cancel { cell }
            }
            Some(kind) => {
                self.selection = Some(Selection { cell, kind });
                SelectionIntent::Swap {
                    previous: selected.cell,
                    current: cell,
                    kind,
                }
            }
            None => self.try_move(board, selected.cell, cell),
        }
    }

    fn try_move(&mut self, board: &mut Board, from: CellId, to: CellId) -> SelectionIntent {
        self.events.clear();
        world::apply(board, Command::MoveToken { from, to }, &mut self.events);

        let Some(event) = self.events.pop() else {
            return SelectionIntent::InvalidMove {
                from,
                to,
                reason: MoveError::InvalidCell,
            };
        };

        match event {
            Event::TokenMoved { kind, path, .. } => {
                self.selection = None;
                let merge = find_match_group(to, &query::occupancy_view(board));
                if let Some(group) = &merge {
                    self.commands.clear();
                    group.collapse_into(to, &mut self.commands);
                    for command in self.commands.drain(..) {
                        world::apply(board, command, &mut self.events);
                    }
                }
                SelectionIntent::Moved {
                    from,
                    to,
                    kind,
                    path,
                    merge,
                }
            }
            Event::MoveRejected { reason, .. } => {
                debug!(
                    from = from.get(),
                    to = to.get(),
                    ?reason,
                    "selection kept after rejected move"
                );
                SelectionIntent::InvalidMove { from, to, reason }
            }
            other => {
                debug!(?other, "unexpected move outcome");
                SelectionIntent::InvalidMove {
                    from,
                    to,
                    reason: MoveError::InvalidCell,
                }
            }
        }
    }
}
