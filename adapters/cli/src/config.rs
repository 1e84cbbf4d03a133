use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use egg_merge_core::{MoveSet, DEFAULT_CELL_SIZE, DEFAULT_COLUMNS, DEFAULT_ROWS};
use egg_merge_system_session::SessionConfig;
use egg_merge_system_spawning::{self as spawning, SPAWNS_PER_TURN};
use serde::Deserialize;

/// Settings read from the optional TOML configuration file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub(crate) struct CliConfig {
    #[serde(default)]
    pub(crate) board: BoardConfig,
    #[serde(default)]
    pub(crate) spawning: SpawningConfig,
    #[serde(default)]
    pub(crate) profile: ProfileConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub(crate) struct BoardConfig {
    #[serde(default = "default_rows")]
    pub(crate) rows: u32,
    #[serde(default = "default_columns")]
    pub(crate) columns: u32,
    #[serde(default = "default_cell_size")]
    pub(crate) cell_size: f32,
    #[serde(default)]
    pub(crate) move_set: MoveSet,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            columns: default_columns(),
            cell_size: default_cell_size(),
            move_set: MoveSet::default(),
        }
    }
}

/// Rank distribution used for refills.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum StrategyChoice {
    #[default]
    Uniform,
    Weighted,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub(crate) struct SpawningConfig {
    #[serde(default = "default_per_turn")]
    pub(crate) per_turn: usize,
    #[serde(default)]
    pub(crate) seed: u64,
    #[serde(default)]
    pub(crate) strategy: StrategyChoice,
}

impl Default for SpawningConfig {
    fn default() -> Self {
        Self {
            per_turn: default_per_turn(),
            seed: 0,
            strategy: StrategyChoice::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub(crate) struct ProfileConfig {
    #[serde(default = "default_user_id")]
    pub(crate) user_id: String,
    #[serde(default)]
    pub(crate) store_dir: Option<PathBuf>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            store_dir: None,
        }
    }
}

impl CliConfig {
    /// Reads the configuration file, or falls back to defaults when no path is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse config toml contents")
    }

    /// Session settings, with an optional seed override from the command line.
    pub(crate) fn session_config(&self, seed_override: Option<u64>) -> SessionConfig {
        SessionConfig {
            rows: self.board.rows,
            columns: self.board.columns,
            cell_size: self.board.cell_size,
            move_set: self.board.move_set,
            spawning: spawning::Config::new(
                self.spawning.per_turn,
                seed_override.unwrap_or(self.spawning.seed),
            ),
        }
    }
}

fn default_rows() -> u32 {
    DEFAULT_ROWS
}

fn default_columns() -> u32 {
    DEFAULT_COLUMNS
}

fn default_cell_size() -> f32 {
    DEFAULT_CELL_SIZE
}

fn default_per_turn() -> usize {
    SPAWNS_PER_TURN
}

fn default_user_id() -> String {
    "currentUser".to_owned()
}
