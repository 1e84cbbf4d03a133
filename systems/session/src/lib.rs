#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Explicit game session tying the board, the systems and the player profile together.
//!
//! A [`Session`] owns every piece of mutable game state. Each click is fully
//! processed, including merges, score, unlocks and refills, before the next
//! one can be submitted.

use egg_merge_core::{
    CellId, Command, Event, MoveSet, TokenKind, DEFAULT_CELL_SIZE, DEFAULT_COLUMNS, DEFAULT_ROWS,
};
use egg_merge_system_progression::{
    guide_step, next_stage, KeyValueStore, ProfileBook, ProfileError, UserProfile,
};
use egg_merge_system_selection::{Selection, SelectionController, SelectionIntent};
use egg_merge_system_spawning::{self as spawning, KindStrategy, Spawning};
use egg_merge_world::{self as world, query, Board};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Profile storage failed.
    #[error(transparent)]
    Profile(#[from] ProfileError),
    /// A turn was submitted before [`Session::start`].
    #[error("the session has not been started")]
    NotStarted,
    /// The tutorial has no stage after the current one.
    #[error("no tutorial stage follows level {level} step {step}")]
    NoMoreStages {
        /// Level the player is still on.
        level: u32,
        /// Step the player is still on.
        step: u32,
    },
}

/// Board shape and spawn policy used by a session.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Number of board rows.
    pub rows: u32,
    /// Number of board columns.
    pub columns: u32,
    /// Edge length of a cell in world units.
    pub cell_size: f32,
    /// Direction mode for token movement.
    pub move_set: MoveSet,
    /// Spawn batch size and seed.
    pub spawning: spawning::Config,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            columns: DEFAULT_COLUMNS,
            cell_size: DEFAULT_CELL_SIZE,
            move_set: MoveSet::Four,
            spawning: spawning::Config::default(),
        }
    }
}

/// Board layout produced when a stage begins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageLayout {
    /// Level of the stage.
    pub level: u32,
    /// Step of the stage.
    pub step: u32,
    /// Whether the layout came from the tutorial script.
    pub guided: bool,
    /// Tokens laid out on the fresh board.
    pub placed: Vec<(CellId, TokenKind)>,
    /// Tutorial hint cells; empty outside the tutorial.
    pub hints: Vec<CellId>,
}

/// Everything that happened during one click.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReport {
    /// Selection outcome of the click.
    pub intent: SelectionIntent,
    /// Points earned by this click.
    pub score_gained: u32,
    /// Accumulated score after the click.
    pub total_score: u64,
    /// Rank newly unlocked by a merge, if any.
    pub unlocked: Option<TokenKind>,
    /// Tokens dropped onto the board after the move.
    pub spawned: Vec<(CellId, TokenKind)>,
    /// Whether the board has no empty cell left.
    pub board_full: bool,
}

/// One player's game.
#[derive(Debug)]
pub struct Session<S, K> {
    config: SessionConfig,
    user_id: String,
    board: Board,
    selection: SelectionController,
    spawning: Spawning<S>,
    profiles: ProfileBook<K>,
    profile: Option<UserProfile>,
    score: u64,
}

impl<S: KindStrategy, K: KeyValueStore> Session<S, K> {
    /// Creates an idle session; call [`Session::start`] before clicking.
    #[must_use]
    pub fn new(config: SessionConfig, strategy: S, store: K, user_id: impl Into<String>) -> Self {
        Self {
            config,
            user_id: user_id.into(),
            board: Board::new(),
            selection: SelectionController::new(),
            spawning: Spawning::new(config.spawning, strategy),
            profiles: ProfileBook::new(store),
            profile: None,
            score: 0,
        }
    }

    /// Loads the player and lays out their current stage.
    pub fn start(&mut self, now_ms: u64) -> Result<StageLayout, SessionError> {
        let profile = self.profiles.check_user_status(&self.user_id, now_ms)?;
        info!(
            user_id = %self.user_id,
            new_user = profile.is_new_user,
            level = profile.current_level,
            step = profile.current_step,
            "session started"
        );
        self.profile = Some(profile);
        self.score = 0;
        self.lay_out_stage()
    }

    /// Processes one click on `cell`.
    pub fn click(&mut self, cell: CellId, now_ms: u64) -> Result<TurnReport, SessionError> {
        let max_unlocked = self.profile()?.max_unlocked_kind;
        let intent = self.selection.on_cell_clicked(&mut self.board, cell);

        let mut score_gained = 0;
        let mut unlocked = None;
        let mut spawned = Vec::new();

        if let SelectionIntent::Moved { merge, .. } = &intent {
            let mut ceiling = max_unlocked;
            if let Some(group) = merge {
                score_gained = group.score();
                self.score = self.score.saturating_add(u64::from(score_gained));
                let promoted = group.promoted_kind();
                if self.profiles.record_synthesis(&self.user_id, promoted)? {
                    unlocked = Some(promoted);
                    ceiling = promoted;
                    if let Some(profile) = self.profile.as_mut() {
                        profile.max_unlocked_kind = promoted;
                    }
                }
            }
            spawned = self.spawn(ceiling);
        }

        debug!(cell = cell.get(), now_ms, ?intent, score_gained, "turn processed");
        Ok(TurnReport {
            intent,
            score_gained,
            total_score: self.score,
            unlocked,
            spawned,
            board_full: self.board.is_full(),
        })
    }

    /// Advances the player to the next stage and lays it out on a fresh board.
    ///
    /// A new player stays put when the tutorial script has nothing after the
    /// current step.
    pub fn complete_stage(&mut self, now_ms: u64) -> Result<StageLayout, SessionError> {
        let current = self.profile()?;
        let is_new_user = current.is_new_user;
        let (level, step) = next_stage(current.current_level, current.current_step, is_new_user);
        if is_new_user && guide_step(level, step).is_none() {
            warn!(
                level = current.current_level,
                step = current.current_step,
                "no tutorial stage left"
            );
            return Err(SessionError::NoMoreStages {
                level: current.current_level,
                step: current.current_step,
            });
        }

        let mut profile = self
            .profiles
            .update_progress(&self.user_id, level, step, now_ms)?;
        profile.is_new_user = is_new_user;
        self.profile = Some(profile);
        self.lay_out_stage()
    }

    /// Replaces every token on the board; the selection is dropped.
    pub fn replace_tokens(&mut self, tokens: &[(CellId, TokenKind)]) {
        self.reset_board();
        let mut events = Vec::new();
        for &(cell, kind) in tokens {
            let command = Command::PlaceToken { cell, kind };
            world::apply(&mut self.board, command, &mut events);
        }
    }

    /// Authoritative board.
    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Current selection, if any.
    #[must_use]
    pub fn selection(&self) -> Option<Selection> {
        self.selection.selection()
    }

    /// Score accumulated since [`Session::start`].
    #[must_use]
    pub const fn score(&self) -> u64 {
        self.score
    }

    /// Player profile as of the last update, once started.
    #[must_use]
    pub fn player(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// Profile storage.
    #[must_use]
    pub fn profiles(&self) -> &ProfileBook<K> {
        &self.profiles
    }

    fn profile(&self) -> Result<&UserProfile, SessionError> {
        self.profile.as_ref().ok_or(SessionError::NotStarted)
    }

    fn reset_board(&mut self) {
        let mut events = Vec::new();
        world::apply(
            &mut self.board,
            Command::ConfigureBoard {
                rows: self.config.rows,
                columns: self.config.columns,
                cell_size: self.config.cell_size,
                move_set: self.config.move_set,
            },
            &mut events,
        );
        self.selection.clear();
    }

    fn lay_out_stage(&mut self) -> Result<StageLayout, SessionError> {
        self.reset_board();
        let profile = self.profile()?;
        let (level, step) = (profile.current_level, profile.current_step);
        let max_unlocked = profile.max_unlocked_kind;

        let guide = if profile.is_new_user {
            guide_step(level, step)
        } else {
            None
        };

        let layout = match guide {
            Some(guide) => {
                let commands: Vec<Command> = guide
                    .placements()
                    .map(|(cell, kind)| Command::PlaceToken { cell, kind })
                    .collect();
                StageLayout {
                    level,
                    step,
                    guided: true,
                    placed: self.apply_placements(commands),
                    hints: guide.hints(),
                }
            }
            None => StageLayout {
                level,
                step,
                guided: false,
                placed: self.spawn(max_unlocked),
                hints: Vec::new(),
            },
        };
        Ok(layout)
    }

    fn spawn(&mut self, max_unlocked: TokenKind) -> Vec<(CellId, TokenKind)> {
        let empty = query::empty_cell_ids(&self.board);
        let mut commands = Vec::new();
        self.spawning.handle(&empty, max_unlocked, &mut commands);
        self.apply_placements(commands)
    }

    fn apply_placements(&mut self, commands: Vec<Command>) -> Vec<(CellId, TokenKind)> {
        let mut events = Vec::new();
        for command in commands {
            world::apply(&mut self.board, command, &mut events);
        }
        events
            .into_iter()
            .filter_map(|event| match event {
                Event::TokenPlaced { cell, kind } => Some((cell, kind)),
                _ => None,
            })
            .collect()
    }
}
