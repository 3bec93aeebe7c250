//! Outcome sources.
//!
//! The engine pulls exactly one outcome per wager from an
//! [`OutcomeSource`]. The live source is a fair coin; tests and replays use
//! a scripted sequence instead.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::types::Outcome;

#[derive(Debug, Error)]
pub enum OutcomeError {
    #[error("Outcome source exhausted after {drawn} draws")]
    Exhausted { drawn: u64 },

    #[error("Outcome source failed: {0}")]
    Source(String),
}

/// Supplies one binary outcome per wager.
#[cfg_attr(test, mockall::automock)]
pub trait OutcomeSource {
    fn next_outcome(&mut self) -> Result<Outcome, OutcomeError>;
}

// ---------------------------------------------------------------------------
// Coin flip
// ---------------------------------------------------------------------------

/// Fair coin: P(WIN) = 0.5, independent draws.
pub struct CoinFlip<R = StdRng> {
    rng: R,
}

impl CoinFlip<StdRng> {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> CoinFlip<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> OutcomeSource for CoinFlip<R> {
    fn next_outcome(&mut self) -> Result<Outcome, OutcomeError> {
        Ok(if self.rng.gen_bool(0.5) {
            Outcome::Win
        } else {
            Outcome::Lose
        })
    }
}

// ---------------------------------------------------------------------------
// Scripted
// ---------------------------------------------------------------------------

/// A fixed sequence of outcomes. Errors once the sequence runs out.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOutcomes {
    queue: VecDeque<Outcome>,
    drawn: u64,
}

impl ScriptedOutcomes {
    pub fn new(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            queue: outcomes.into_iter().collect(),
            drawn: 0,
        }
    }

    /// Parse a comma-separated script such as `lose,lose,win`.
    pub fn parse(script: &str) -> anyhow::Result<Self> {
        let outcomes = script
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .collect::<anyhow::Result<Vec<Outcome>>>()?;
        Ok(Self::new(outcomes))
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl OutcomeSource for ScriptedOutcomes {
    fn next_outcome(&mut self) -> Result<Outcome, OutcomeError> {
        let outcome = self
            .queue
            .pop_front()
            .ok_or(OutcomeError::Exhausted { drawn: self.drawn })?;
        self.drawn += 1;
        Ok(outcome)
    }
}
