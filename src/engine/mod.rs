//! Core engine — outcome sources, session state and the staking loop.

pub mod accountant;
pub mod outcome;
pub mod session;

use anyhow::{Context, Result};
use std::future::Future;
use tracing::info;

use crate::storage::TradeRecorder;
use crate::types::SessionSummary;
use outcome::OutcomeSource;
use session::{CancelToken, StakingEngine};

/// Run a session on the blocking pool until it ends or `shutdown` fires.
///
/// When `shutdown` resolves first the session is cancelled; it finishes
/// the wager in flight and reports [`TerminalReason::Cancelled`].
///
/// [`TerminalReason::Cancelled`]: crate::types::TerminalReason::Cancelled
pub async fn run_until<F>(
    engine: StakingEngine,
    mut outcomes: Box<dyn OutcomeSource + Send>,
    mut sink: Box<dyn TradeRecorder + Send>,
    shutdown: F,
) -> Result<SessionSummary>
where
    F: Future<Output = ()>,
{
    let token = CancelToken::new();
    let engine = engine.with_cancel(token.clone());

    let mut handle =
        tokio::task::spawn_blocking(move || engine.run_session(&mut *outcomes, &mut *sink));

    tokio::pin!(shutdown);

    let joined = tokio::select! {
        joined = &mut handle => joined,
        _ = &mut shutdown => {
            info!("Shutdown signal received, stopping after the current wager");
            token.cancel();
            handle.await
        }
    };

    let summary = joined.context("Session task panicked")??;
    Ok(summary)
}
