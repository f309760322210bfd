//! Solvable-puzzle generation.

use log::{debug, error};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::solver::is_solvable;
use shared::{Puzzle, CARD_MAX, CARD_MIN, PUZZLE_SIZE};
use std::error::Error;
use std::fmt;

/// Hard cap on sampling attempts. Random hands are solvable often enough
/// that hitting this means the solver has regressed, so the generation
/// attempt fails fast instead of spinning.
pub const MAX_GENERATION_ATTEMPTS: u32 = 1_000;

/// Generation gave up without finding a solvable hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleExhausted {
    pub attempts: u32,
}

impl fmt::Display for PuzzleExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no solvable puzzle found after {} attempts",
            self.attempts
        )
    }
}

impl Error for PuzzleExhausted {}

/// Samples hands of four cards until one is solvable.
pub struct PuzzleGenerator {
    rng: StdRng,
}

impl PuzzleGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn generate(&mut self) -> Result<Puzzle, PuzzleExhausted> {
        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let mut puzzle: Puzzle = [0; PUZZLE_SIZE];
            for card in puzzle.iter_mut() {
                *card = self.rng.gen_range(CARD_MIN..=CARD_MAX);
            }

            if is_solvable(&puzzle) {
                debug!("Generated puzzle {:?} after {} attempt(s)", puzzle, attempt);
                return Ok(puzzle);
            }
        }

        error!(
            "Puzzle generation exhausted {} attempts",
            MAX_GENERATION_ATTEMPTS
        );
        Err(PuzzleExhausted {
            attempts: MAX_GENERATION_ATTEMPTS,
        })
    }
}

impl Default for PuzzleGenerator {
    fn default() -> Self {
        Self::new()
    }
}
