#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic spawning system responsible for refilling the board after each turn.

use egg_merge_core::{CellId, Command, TokenKind};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Number of tokens dropped onto the board after every successful move.
pub const SPAWNS_PER_TURN: usize = 3;

/// Relative odds of each rank used by [`WeightedTable::default`].
pub const DEFAULT_KIND_WEIGHTS: [u32; 7] = [40, 25, 15, 10, 5, 3, 2];

/// Configuration parameters required to construct the spawning system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    per_turn: usize,
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration using the provided batch size and seed.
    #[must_use]
    pub const fn new(per_turn: usize, rng_seed: u64) -> Self {
        Self { per_turn, rng_seed }
    }

    /// Number of tokens emitted per call to [`Spawning::handle`].
    #[must_use]
    pub const fn per_turn(&self) -> usize {
        self.per_turn
    }

    /// Seed of the random stream.
    #[must_use]
    pub const fn rng_seed(&self) -> u64 {
        self.rng_seed
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(SPAWNS_PER_TURN, 0)
    }
}

/// Chooses the rank of a newly spawned token.
pub trait KindStrategy {
    /// Picks a rank no higher than `max_unlocked`.
    fn pick<R: Rng + ?Sized>(&self, rng: &mut R, max_unlocked: TokenKind) -> TokenKind;
}

/// Every unlocked rank is equally likely.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnlockedUniform;

impl KindStrategy for UnlockedUniform {
    fn pick<R: Rng + ?Sized>(&self, rng: &mut R, max_unlocked: TokenKind) -> TokenKind {
        let rank = rng.gen_range(0..=max_unlocked.rank());
        TokenKind::new(rank).unwrap_or(max_unlocked)
    }
}

/// Ranks are drawn from a weight table cut off at the highest unlocked rank.
#[derive(Clone, Copy, Debug)]
pub struct WeightedTable {
    weights: [u32; 7],
}

impl WeightedTable {
    /// Creates a strategy using the provided per-rank weights.
    #[must_use]
    pub const fn new(weights: [u32; 7]) -> Self {
        Self { weights }
    }
}

impl Default for WeightedTable {
    fn default() -> Self {
        Self::new(DEFAULT_KIND_WEIGHTS)
    }
}

impl KindStrategy for WeightedTable {
    fn pick<R: Rng + ?Sized>(&self, rng: &mut R, max_unlocked: TokenKind) -> TokenKind {
        let allowed = &self.weights[..=usize::from(max_unlocked.rank())];
        let total: u32 = allowed.iter().sum();
        if total == 0 {
            return TokenKind::MIN;
        }

        let mut roll = rng.gen_range(0..total);
        for (rank, &weight) in allowed.iter().enumerate() {
            if roll < weight {
                let rank = u8::try_from(rank).unwrap_or(0);
                return TokenKind::new(rank).unwrap_or(TokenKind::MIN);
            }
            roll -= weight;
        }
        max_unlocked
    }
}

/// Pure system that emits placement commands for freshly spawned tokens.
#[derive(Debug)]
pub struct Spawning<S = UnlockedUniform> {
    per_turn: usize,
    strategy: S,
    rng: ChaCha8Rng,
    pool: Vec<CellId>,
}

impl<S: KindStrategy> Spawning<S> {
    /// Creates a new spawning system using the supplied configuration and strategy.
    #[must_use]
    pub fn new(config: Config, strategy: S) -> Self {
        Self {
            per_turn: config.per_turn,
            strategy,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            pool: Vec::new(),
        }
    }

    /// Emits up to `per_turn` placements on distinct cells drawn from `empty_cells`.
    pub fn handle(
        &mut self,
        empty_cells: &[CellId],
        max_unlocked: TokenKind,
        out: &mut Vec<Command>,
    ) {
        self.pool.clear();
        self.pool.extend_from_slice(empty_cells);

        let count = self.per_turn.min(self.pool.len());
        if count < self.per_turn {
            debug!(
                requested = self.per_turn,
                available = self.pool.len(),
                "board too full for a complete spawn batch"
            );
        }

        for _ in 0..count {
            let kind = self.strategy.pick(&mut self.rng, max_unlocked);
            let index = self.rng.gen_range(0..self.pool.len());
            let cell = self.pool.remove(index);
            out.push(Command::PlaceToken { cell, kind });
        }
    }
}
