#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Player profiles, tutorial scripting and stage progression.

mod guide;
mod store;

use egg_merge_core::TokenKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub use guide::{guide_step, next_stage, GuideStep, GUIDE_STEPS_PER_LEVEL};
pub use store::{DirectoryStore, KeyValueStore, MemoryStore};

const PROFILE_KEY_PREFIX: &str = "gameUserData";

/// Errors raised while loading or saving profiles.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The backing store could not be read or written.
    #[error("profile storage failed: {0}")]
    Io(#[from] std::io::Error),
    /// A stored blob was not a valid profile.
    #[error("profile blob is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// An update named a user that has never been seen.
    #[error("no profile stored for user `{user_id}`")]
    MissingProfile {
        /// Requested user.
        user_id: String,
    },
    /// The key cannot be mapped onto the backing store.
    #[error("`{key}` is not a usable storage key")]
    InvalidKey {
        /// Offending key.
        key: String,
    },
}

/// Persistent progress of one player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Stable player identifier.
    pub user_id: String,
    /// Whether this is the player's first session.
    pub is_new_user: bool,
    /// Current level.
    pub current_level: u32,
    /// Current step within the level, starting at 1.
    pub current_step: u32,
    /// Highest rank the player has produced; spawns never exceed it.
    pub max_unlocked_kind: TokenKind,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at_ms: u64,
    /// Last session start or progress update, in milliseconds since the Unix epoch.
    pub last_played_at_ms: u64,
    /// Accumulated time between progress updates.
    pub total_play_time_ms: u64,
    /// Completed stages formatted as `"level-step"`.
    #[serde(default)]
    pub completed_steps: Vec<String>,
}

impl UserProfile {
    /// Profile of a player who has never played.
    #[must_use]
    pub fn new(user_id: impl Into<String>, now_ms: u64) -> Self {
        Self {
            user_id: user_id.into(),
            is_new_user: true,
            current_level: 0,
            current_step: 1,
            max_unlocked_kind: TokenKind::MIN,
            created_at_ms: now_ms,
            last_played_at_ms: now_ms,
            total_play_time_ms: 0,
            completed_steps: Vec::new(),
        }
    }
}

/// Profile persistence on top of a [`KeyValueStore`].
#[derive(Debug)]
pub struct ProfileBook<S> {
    store: S,
}

impl<S: KeyValueStore> ProfileBook<S> {
    /// Wraps the provided store.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Read-only access to the backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads a stored profile without touching it.
    pub fn load(&self, user_id: &str) -> Result<Option<UserProfile>, ProfileError> {
        match self.store.get(&profile_key(user_id))? {
            Some(blob) => Ok(Some(serde_json::from_str(&blob)?)),
            None => Ok(None),
        }
    }

    /// Writes the profile back to the store.
    pub fn save(&mut self, profile: &UserProfile) -> Result<(), ProfileError> {
        let blob = serde_json::to_string(profile)?;
        self.store.set(&profile_key(&profile.user_id), blob)
    }

    /// Opens a session for `user_id`.
    ///
    /// Unknown players receive a fresh new-user profile. Known players are
    /// marked as returning and their last-played time is refreshed.
    pub fn check_user_status(
        &mut self,
        user_id: &str,
        now_ms: u64,
    ) -> Result<UserProfile, ProfileError> {
        let profile = match self.load(user_id)? {
            Some(mut existing) => {
                existing.is_new_user = false;
                existing.last_played_at_ms = now_ms;
                info!(
                    user_id,
                    level = existing.current_level,
                    step = existing.current_step,
                    max_unlocked = existing.max_unlocked_kind.rank(),
                    "returning player"
                );
                existing
            }
            None => {
                info!(user_id, "new player");
                UserProfile::new(user_id, now_ms)
            }
        };
        self.save(&profile)?;
        Ok(profile)
    }

    /// Moves the player to `(level, step)` and records the stage as completed.
    pub fn update_progress(
        &mut self,
        user_id: &str,
        level: u32,
        step: u32,
        now_ms: u64,
    ) -> Result<UserProfile, ProfileError> {
        let mut profile = self.require(user_id)?;
        profile.total_play_time_ms = profile
            .total_play_time_ms
            .saturating_add(now_ms.saturating_sub(profile.last_played_at_ms));
        profile.current_level = level;
        profile.current_step = step;
        profile.last_played_at_ms = now_ms;

        let stage = format!("{level}-{step}");
        if !profile.completed_steps.contains(&stage) {
            profile.completed_steps.push(stage);
        }

        self.save(&profile)?;
        Ok(profile)
    }

    /// Raises the unlock ceiling after a merge produced `kind`.
    ///
    /// Returns `true` when the ceiling moved.
    pub fn record_synthesis(
        &mut self,
        user_id: &str,
        kind: TokenKind,
    ) -> Result<bool, ProfileError> {
        let mut profile = self.require(user_id)?;
        if kind <= profile.max_unlocked_kind {
            return Ok(false);
        }

        debug!(
            user_id,
            previous = profile.max_unlocked_kind.rank(),
            unlocked = kind.rank(),
            kind = kind.name(),
            "new rank unlocked"
        );
        profile.max_unlocked_kind = kind;
        self.save(&profile)?;
        Ok(true)
    }

    fn require(&self, user_id: &str) -> Result<UserProfile, ProfileError> {
        match self.load(user_id)? {
            Some(profile) => Ok(profile),
            None => Err(ProfileError::MissingProfile {
                user_id: user_id.to_owned(),
            }),
        }
    }
}

fn profile_key(user_id: &str) -> String {
    format!("{PROFILE_KEY_PREFIX}-{user_id}")
}
