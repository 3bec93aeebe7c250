//! Accountant — per-session profit/loss tallies and stake progression.
//!
//! [`SessionState`] is the martingale state machine's memory. It is owned
//! by exactly one running session. A wager is first settled into a
//! [`WagerRecord`] from the current state, and only applied once the
//! caller has decided the record is safely logged.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::strategy::StakingConfig;
use crate::types::{Outcome, TerminalReason, WagerRecord};

/// A running total or the next stake left the `Decimal` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Stake arithmetic overflowed on trade {trade}")]
pub struct StakeOverflow {
    pub trade: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    cumulative_profit: Decimal,
    cumulative_loss: Decimal,
    current_stake: Decimal,
    loss_streak_index: usize,
    trade_count: u64,
    wins: u64,
    losses: u64,
}

impl SessionState {
    /// Fresh state: stake at `initial_stake`, every counter at zero.
    pub fn new(config: &StakingConfig) -> Self {
        Self {
            cumulative_profit: Decimal::ZERO,
            cumulative_loss: Decimal::ZERO,
            current_stake: config.initial_stake(),
            loss_streak_index: 0,
            trade_count: 0,
            wins: 0,
            losses: 0,
        }
    }

    /// Sum of stakes won.
    pub fn cumulative_profit(&self) -> Decimal {
        self.cumulative_profit
    }

    /// Sum of stakes lost, as a non-negative magnitude.
    pub fn cumulative_loss(&self) -> Decimal {
        self.cumulative_loss
    }

    pub fn current_stake(&self) -> Decimal {
        self.current_stake
    }

    pub fn loss_streak_index(&self) -> usize {
        self.loss_streak_index
    }

    pub fn trade_count(&self) -> u64 {
        self.trade_count
    }

    pub fn wins(&self) -> u64 {
        self.wins
    }

    pub fn losses(&self) -> u64 {
        self.losses
    }

    /// Which threshold, if any, has been reached. Profit is checked first.
    pub fn threshold_reached(&self, config: &StakingConfig) -> Option<TerminalReason> {
        if self.cumulative_profit >= config.take_profit() {
            Some(TerminalReason::ProfitTarget)
        } else if self.cumulative_loss >= config.stop_loss() {
            Some(TerminalReason::LossLimit)
        } else {
            None
        }
    }

    /// Build the record for the next wager without touching the state.
    pub fn settle(&self, outcome: Outcome, timestamp: DateTime<Utc>) -> WagerRecord {
        WagerRecord::new(self.trade_count + 1, outcome, self.current_stake, timestamp)
    }

    /// The state after a settled wager, leaving `self` untouched.
    ///
    /// A win resets the progression to `initial_stake` and rung 0. A loss
    /// moves one rung up the ladder (held at the last rung) and sets the
    /// next stake to `ladder[rung] * multiplier`. All arithmetic is checked.
    pub fn advanced(&self, record: &WagerRecord, config: &StakingConfig) -> Result<SessionState, StakeOverflow> {
        debug_assert_eq!(record.trade(), self.trade_count + 1);
        debug_assert_eq!(record.stake(), self.current_stake);

        let overflow = StakeOverflow { trade: record.trade() };
        let mut next = self.clone();

        match record.outcome() {
            Outcome::Win => {
                next.cumulative_profit = self.cumulative_profit.checked_add(record.stake()).ok_or(overflow)?;
                next.wins += 1;
                next.current_stake = config.initial_stake();
                next.loss_streak_index = 0;
            }
            Outcome::Lose => {
                next.cumulative_loss = self.cumulative_loss.checked_add(record.stake()).ok_or(overflow)?;
                next.losses += 1;
                next.loss_streak_index = (self.loss_streak_index + 1).min(config.last_rung());
                next.current_stake = config.stake_after_loss(next.loss_streak_index).ok_or(overflow)?;
            }
        }
        next.trade_count += 1;
        Ok(next)
    }

    /// Advance the state past a settled wager. On overflow nothing changes.
    pub fn apply(&mut self, record: &WagerRecord, config: &StakingConfig) -> Result<(), StakeOverflow> {
        *self = self.advanced(record, config)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
