//! Staking engine — the martingale session loop.
//!
//! One iteration per wager: check thresholds, draw an outcome, settle it
//! into a record, hand the record to the recorder, then advance the
//! state. In strict mode a record that fails to persist ends the session
//! before the state moves, so the log and the state never disagree.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use super::accountant::{SessionState, StakeOverflow};
use super::outcome::{OutcomeError, OutcomeSource};
use crate::config::AppConfig;
use crate::storage::TradeRecorder;
use crate::strategy::StakingConfig;
use crate::types::{PersistenceMode, SessionSummary, TerminalReason};

/// Default hard cap on wagers per session.
pub const DEFAULT_MAX_TRADES: u64 = 100_000;

// ---------------------------------------------------------------------------
// Limits & cancellation
// ---------------------------------------------------------------------------

/// Shared flag that asks a running session to stop after the current wager.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Engine-imposed bounds that sit on top of the staking thresholds.
#[derive(Debug, Clone)]
pub struct SessionLimits {
    pub max_trades: u64,
    pub persistence: PersistenceMode,
    pub cancel: Option<CancelToken>,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_trades: DEFAULT_MAX_TRADES,
            persistence: PersistenceMode::Strict,
            cancel: None,
        }
    }
}

impl SessionLimits {
    pub fn from_app(app: &AppConfig) -> Self {
        Self {
            max_trades: app.session.max_trades,
            persistence: app.session.persistence,
            cancel: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A session that could not run to a terminal condition. The attached
/// summary covers every wager that was applied before the failure.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Trade {trade}: failed to persist wager record: {error:#}")]
    Persistence {
        trade: u64,
        error: anyhow::Error,
        summary: Box<SessionSummary>,
    },

    #[error("{source}")]
    Overflow {
        trade: u64,
        #[source]
        source: StakeOverflow,
        summary: Box<SessionSummary>,
    },

    #[error("Trade {trade}: {source}")]
    Outcome {
        trade: u64,
        #[source]
        source: OutcomeError,
        summary: Box<SessionSummary>,
    },
}

impl SessionError {
    pub fn summary(&self) -> &SessionSummary {
        match self {
            SessionError::Persistence { summary, .. }
            | SessionError::Overflow { summary, .. }
            | SessionError::Outcome { summary, .. } => summary,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct StakingEngine {
    config: StakingConfig,
    limits: SessionLimits,
}

impl StakingEngine {
    pub fn new(config: StakingConfig, limits: SessionLimits) -> Self {
        Self { config, limits }
    }

    pub fn config(&self) -> &StakingConfig {
        &self.config
    }

    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    /// Attach a cancellation token, replacing any existing one.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.limits.cancel = Some(token);
        self
    }

    /// Run one session to completion.
    ///
    /// Draws one outcome and appends one record per wager, in order, until
    /// a threshold (`>=`) is reached, the trade cap is hit or the session
    /// is cancelled. Outcome-source failures always abort; recorder
    /// failures abort in strict mode and are counted in best-effort mode.
    pub fn run_session(
        &self,
        outcomes: &mut dyn OutcomeSource,
        sink: &mut dyn TradeRecorder,
    ) -> Result<SessionSummary, SessionError> {
        let session_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = info_span!("session", %session_id);
        let _guard = span.enter();

        let mut state = SessionState::new(&self.config);
        let mut dropped_records = 0u64;

        info!(
            initial_stake = %self.config.initial_stake(),
            take_profit = %self.config.take_profit(),
            stop_loss = %self.config.stop_loss(),
            max_trades = self.limits.max_trades,
            persistence = ?self.limits.persistence,
            "Starting session"
        );

        let reason = loop {
            if let Some(reason) = state.threshold_reached(&self.config) {
                break reason;
            }
            if state.trade_count() >= self.limits.max_trades {
                warn!(max_trades = self.limits.max_trades, "Trade cap reached before any threshold");
                break TerminalReason::TradeCap;
            }
            if self.limits.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                info!(trades = state.trade_count(), "Session cancelled");
                break TerminalReason::Cancelled;
            }

            let trade = state.trade_count() + 1;
            let outcome = match outcomes.next_outcome() {
                Ok(outcome) => outcome,
                Err(source) => {
                    error!(trade, error = %source, "Outcome source failed");
                    return Err(SessionError::Outcome {
                        trade,
                        source,
                        summary: Box::new(summarize(session_id, &state, None, dropped_records, started_at)),
                    });
                }
            };

            let record = state.settle(outcome, Utc::now());
            let next = match state.advanced(&record, &self.config) {
                Ok(next) => next,
                Err(source) => {
                    error!(trade, stake = %record.stake(), "Stake arithmetic overflowed, aborting session");
                    return Err(SessionError::Overflow {
                        trade,
                        source,
                        summary: Box::new(summarize(session_id, &state, None, dropped_records, started_at)),
                    });
                }
            };

            if let Err(e) = sink.append(&record) {
                match self.limits.persistence {
                    PersistenceMode::Strict => {
                        error!(trade, error = %e, "Failed to persist wager, aborting session");
                        return Err(SessionError::Persistence {
                            trade,
                            error: e,
                            summary: Box::new(summarize(session_id, &state, None, dropped_records, started_at)),
                        });
                    }
                    PersistenceMode::BestEffort => {
                        warn!(trade, error = %e, "Dropped wager record (best-effort logging)");
                        dropped_records += 1;
                    }
                }
            }

            state = next;

            info!(
                trade,
                outcome = %outcome,
                stake = format!("{:.2}", record.stake()),
                profit = format!("{:.2}", state.cumulative_profit()),
                loss = format!("{:.2}", state.cumulative_loss()),
                "Wager settled"
            );
            debug!(
                next_stake = %state.current_stake(),
                rung = state.loss_streak_index(),
                "Stake adjusted"
            );
        };

        let summary = summarize(session_id, &state, Some(reason), dropped_records, started_at);
        info!(
            trades = summary.total_trades,
            wins = summary.wins,
            losses = summary.losses,
            profit = format!("{:.2}", summary.final_profit),
            loss = format!("{:.2}", summary.final_loss),
            dropped = summary.dropped_records,
            reason = ?reason,
            "{reason}"
        );
        Ok(summary)
    }
}

fn summarize(
    session_id: Uuid,
    state: &SessionState,
    terminal_reason: Option<TerminalReason>,
    dropped_records: u64,
    started_at: DateTime<Utc>,
) -> SessionSummary {
    SessionSummary {
        session_id,
        total_trades: state.trade_count(),
        wins: state.wins(),
        losses: state.losses(),
        final_profit: state.cumulative_profit(),
        final_loss: state.cumulative_loss(),
        terminal_reason,
        dropped_records,
        started_at,
        finished_at: Utc::now(),
    }
}

/// Run a session with the default limits (strict persistence, default cap).
pub fn run_session(
    config: &StakingConfig,
    outcomes: &mut dyn OutcomeSource,
    sink: &mut dyn TradeRecorder,
) -> Result<SessionSummary, SessionError> {
    StakingEngine::new(config.clone(), SessionLimits::default()).run_session(outcomes, sink)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
