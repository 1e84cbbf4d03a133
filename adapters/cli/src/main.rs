#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that drives headless Egg Merge sessions.

mod config;
mod layout_transfer;

use std::{
    fmt::Write as _,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use egg_merge_core::{CellCoord, CellId, MoveSet, PathStep};
use egg_merge_system_progression::{DirectoryStore, KeyValueStore, MemoryStore};
use egg_merge_system_selection::SelectionIntent;
use egg_merge_system_session::{Session, StageLayout, TurnReport};
use egg_merge_system_spawning::{KindStrategy, UnlockedUniform, WeightedTable};
use egg_merge_world::{query, Board, Grid, PathFinder};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{CliConfig, StrategyChoice};
use crate::layout_transfer::BoardSnapshot;

#[derive(Debug, Parser)]
#[command(
    name = "egg-merge",
    version,
    about = "Headless driver for the Egg Merge board"
)]
struct Cli {
    /// TOML file with `[board]`, `[spawning]` and `[profile]` tables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Starts a session and feeds it a sequence of clicks.
    Play(PlayArgs),
    /// Runs a single path search on an otherwise empty board.
    Path(PathArgs),
}

#[derive(Debug, Args)]
struct PlayArgs {
    /// Comma-separated cell ids to click, in order.
    #[arg(long, value_delimiter = ',')]
    clicks: Vec<u32>,
    /// Layout string to load after the session starts.
    #[arg(long)]
    layout: Option<String>,
    /// Overrides the spawn seed from the config file.
    #[arg(long)]
    seed: Option<u64>,
    /// Directory holding player profiles; profiles live in memory otherwise.
    #[arg(long)]
    store: Option<PathBuf>,
    /// Player to load; defaults to the configured user.
    #[arg(long)]
    user: Option<String>,
}

#[derive(Debug, Args)]
struct PathArgs {
    /// Start cell as `row,column`.
    #[arg(long, value_parser = parse_coord)]
    from: CellCoord,
    /// Goal cell as `row,column`.
    #[arg(long, value_parser = parse_coord)]
    to: CellCoord,
    /// Overrides the configured number of rows.
    #[arg(long)]
    rows: Option<u32>,
    /// Overrides the configured number of columns.
    #[arg(long)]
    columns: Option<u32>,
    /// Comma-separated cell ids treated as occupied.
    #[arg(long, value_delimiter = ',')]
    blocked: Vec<u32>,
    /// Allows diagonal steps.
    #[arg(long)]
    diagonal: bool,
}

/// Entry point for the Egg Merge command-line interface.
fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;

    match cli.command {
        CliCommand::Play(args) => play(&config, &args),
        CliCommand::Path(args) => path(&config, &args),
    }
}

fn play(config: &CliConfig, args: &PlayArgs) -> Result<()> {
    match args.store.as_ref().or(config.profile.store_dir.as_ref()) {
        Some(dir) => {
            let store = DirectoryStore::open(dir)
                .with_context(|| format!("failed to open profile store {}", dir.display()))?;
            play_with_store(config, args, store)
        }
        None => play_with_store(config, args, MemoryStore::new()),
    }
}

fn play_with_store<K: KeyValueStore>(config: &CliConfig, args: &PlayArgs, store: K) -> Result<()> {
    let session_config = config.session_config(args.seed);
    let user = args
        .user
        .clone()
        .unwrap_or_else(|| config.profile.user_id.clone());

    match config.spawning.strategy {
        StrategyChoice::Uniform => run_session(
            Session::new(session_config, UnlockedUniform, store, user),
            args,
        ),
        StrategyChoice::Weighted => run_session(
            Session::new(session_config, WeightedTable::default(), store, user),
            args,
        ),
    }
}

fn run_session<S: KindStrategy, K: KeyValueStore>(
    mut session: Session<S, K>,
    args: &PlayArgs,
) -> Result<()> {
    let layout = session.start(now_ms()).context("failed to start session")?;
    println!("{}", describe_stage(&layout));

    if let Some(encoded) = &args.layout {
        let snapshot = BoardSnapshot::decode(encoded).context("failed to load layout")?;
        let grid = query::grid(session.board());
        if (snapshot.columns, snapshot.rows) != (grid.columns(), grid.rows()) {
            bail!(
                "layout is {}x{} but the board is {}x{}",
                snapshot.columns,
                snapshot.rows,
                grid.columns(),
                grid.rows()
            );
        }
        session.replace_tokens(&snapshot.placements());
        info!(tokens = snapshot.tokens.len(), "layout loaded");
    }

    for &cell in &args.clicks {
        let report = session
            .click(CellId::new(cell), now_ms())
            .with_context(|| format!("failed to process click on cell {cell}"))?;
        println!("{}", describe_turn(cell, &report));
        if report.board_full {
            println!("board is full");
            break;
        }
    }

    println!("{}", render_board(session.board()));
    println!("score: {}", session.score());
    let encoded = BoardSnapshot::from_board(session.board())
        .encode()
        .context("failed to encode layout")?;
    println!("layout: {encoded}");
    Ok(())
}

fn path(config: &CliConfig, args: &PathArgs) -> Result<()> {
    let rows = args.rows.unwrap_or(config.board.rows);
    let columns = args.columns.unwrap_or(config.board.columns);
    let move_set = if args.diagonal {
        MoveSet::Eight
    } else {
        config.board.move_set
    };

    let mut grid = Grid::new(rows, columns, config.board.cell_size);
    for &cell in &args.blocked {
        grid.set_walkable(CellId::new(cell), false)
            .with_context(|| format!("cannot block cell {cell}"))?;
    }

    let mut finder = PathFinder::new(move_set);
    finder.init(&grid);
    let steps = finder
        .search(&grid, args.from, args.to)
        .context("path search failed")?;

    if steps.is_empty() {
        println!("no path");
    } else {
        println!("{}", describe_path(&steps));
    }
    Ok(())
}

fn parse_coord(value: &str) -> Result<CellCoord, String> {
    let (row, column) = value
        .split_once(',')
        .ok_or_else(|| format!("expected `row,column`, got `{value}`"))?;
    let row = row
        .trim()
        .parse::<u32>()
        .map_err(|error| format!("invalid row `{row}`: {error}"))?;
    let column = column
        .trim()
        .parse::<u32>()
        .map_err(|error| format!("invalid column `{column}`: {error}"))?;
    Ok(CellCoord::new(row, column))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn describe_stage(layout: &StageLayout) -> String {
    let mut line = format!(
        "stage {}-{} ({}): {} tokens",
        layout.level,
        layout.step,
        if layout.guided { "guided" } else { "random" },
        layout.placed.len()
    );
    if !layout.hints.is_empty() {
        let hints: Vec<String> = layout
            .hints
            .iter()
            .map(|cell| cell.get().to_string())
            .collect();
        let _ = write!(line, ", hint {}", hints.join(" -> "));
    }
    line
}

fn describe_turn(cell: u32, report: &TurnReport) -> String {
    let mut line = match &report.intent {
        SelectionIntent::Select { kind, .. } => format!("{cell}: select {}", kind.name()),
        SelectionIntent::Cancel { .. } => format!("{cell}: cancel"),
        SelectionIntent::Swap { previous, kind, .. } => {
            let previous = previous.get();
            format!("{cell}: switch from {previous} to {}", kind.name())
        }
        SelectionIntent::InvalidMove { from, reason, .. } => {
            format!("{cell}: cannot move from {} ({reason:?})", from.get())
        }
        SelectionIntent::Moved {
            from, path, merge, ..
        } => {
            let (from, steps) = (from.get(), path.len());
            let mut moved = format!("{cell}: moved from {from} in {steps} steps");
            if let Some(group) = merge {
                let _ = write!(
                    moved,
                    ", merged {} into {} (+{})",
                    group.members().len(),
                    group.promoted_kind().name(),
                    group.score()
                );
            }
            moved
        }
        SelectionIntent::Ignored { .. } => format!("{cell}: nothing to select"),
    };
    if let Some(kind) = report.unlocked {
        let _ = write!(line, ", unlocked {}", kind.name());
    }
    if !report.spawned.is_empty() {
        let spawned: Vec<String> = report
            .spawned
            .iter()
            .map(|(cell, kind)| format!("{}={}", cell.get(), kind.rank()))
            .collect();
        let _ = write!(line, ", spawned {}", spawned.join(" "));
    }
    line
}

fn describe_path(steps: &[PathStep]) -> String {
    steps
        .iter()
        .map(|step| format!("{},{}", step.cell.row(), step.cell.column()))
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn render_board(board: &Board) -> String {
    let grid = query::grid(board);
    let mut out = String::new();
    for row in 0..grid.rows() {
        for column in 0..grid.columns() {
            let cell = CellId::new(row * grid.columns() + column);
            let symbol = query::token_at(board, cell)
                .map(|kind| char::from(b'0' + kind.rank()))
                .unwrap_or('.');
            out.push(symbol);
        }
        if row + 1 < grid.rows() {
            out.push('\n');
        }
    }
    out
}
