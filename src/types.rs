//! Shared types for the martingale simulator.
//!
//! These types form the data model passed between the staking engine,
//! the trade recorder and the analysis layer. They carry no behaviour
//! beyond construction, display and a few derived quantities.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of a single binary wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Win,
    Lose,
}

impl Outcome {
    pub fn is_win(&self) -> bool {
        matches!(self, Outcome::Win)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win => write!(f, "WIN"),
            Outcome::Lose => write!(f, "LOSE"),
        }
    }
}

/// Parse `win`/`lose` (case-insensitive). Also accepts `w`/`l`.
impl std::str::FromStr for Outcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "win" | "w" => Ok(Outcome::Win),
            "lose" | "loss" | "l" => Ok(Outcome::Lose),
            _ => Err(anyhow::anyhow!("Unknown outcome: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Wager record
// ---------------------------------------------------------------------------

/// One settled wager, exactly as it is written to the trade history log.
///
/// Field renames match the CSV header
/// `Timestamp,Trade,Outcome,Stake,Profit/Loss`. Monetary columns are
/// stored as decimal strings so a re-read yields identical values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WagerRecord {
    #[serde(rename = "Timestamp")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "Trade")]
    trade: u64,
    #[serde(rename = "Outcome")]
    outcome: Outcome,
    #[serde(rename = "Stake", with = "rust_decimal::serde::str")]
    stake: Decimal,
    #[serde(rename = "Profit/Loss", with = "rust_decimal::serde::str")]
    profit_loss: Decimal,
}

impl WagerRecord {
    /// Build a record. Profit/loss is derived from the outcome:
    /// `+stake` on a win, `-stake` on a loss.
    pub fn new(trade: u64, outcome: Outcome, stake: Decimal, timestamp: DateTime<Utc>) -> Self {
        let profit_loss = match outcome {
            Outcome::Win => stake,
            Outcome::Lose => -stake,
        };
        Self {
            timestamp,
            trade,
            outcome,
            stake,
            profit_loss,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// 1-based sequence number within the session.
    pub fn trade(&self) -> u64 {
        self.trade
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn stake(&self) -> Decimal {
        self.stake
    }

    pub fn profit_loss(&self) -> Decimal {
        self.profit_loss
    }
}

impl fmt::Display for WagerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade {}: {} | Stake: {:.2} | P/L: {:+.2}",
            self.trade, self.outcome, self.stake, self.profit_loss,
        )
    }
}

// ---------------------------------------------------------------------------
// Session termination
// ---------------------------------------------------------------------------

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// Cumulative profit reached `take_profit`.
    ProfitTarget,
    /// Cumulative loss reached `stop_loss`.
    LossLimit,
    /// The hard trade cap was hit before either threshold.
    TradeCap,
    /// The session was cancelled from outside (e.g. Ctrl+C).
    Cancelled,
}

impl TerminalReason {
    /// Whether one of the configured thresholds ended the session.
    pub fn is_threshold(&self) -> bool {
        matches!(self, TerminalReason::ProfitTarget | TerminalReason::LossLimit)
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalReason::ProfitTarget => write!(f, "Take profit target reached"),
            TerminalReason::LossLimit => write!(f, "Stop loss limit reached"),
            TerminalReason::TradeCap => write!(f, "Trade cap reached"),
            TerminalReason::Cancelled => write!(f, "Session cancelled"),
        }
    }
}

/// How the engine reacts when the trade recorder fails to persist a wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceMode {
    /// Abort the session; state never advances past an unlogged wager.
    #[default]
    Strict,
    /// Warn, count the dropped record and keep going.
    BestEffort,
}

// ---------------------------------------------------------------------------
// Session summary
// ---------------------------------------------------------------------------

/// Final (or partial, on error) accounting for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub total_trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub final_profit: Decimal,
    pub final_loss: Decimal,
    /// `None` only on a summary attached to a session error.
    pub terminal_reason: Option<TerminalReason>,
    /// Records the recorder failed to persist (best-effort mode only).
    pub dropped_records: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionSummary {
    /// Profit minus loss.
    pub fn net_pnl(&self) -> Decimal {
        self.final_profit - self.final_loss
    }

    /// Win rate as a percentage. Returns 0.0 with no trades.
    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            0.0
        } else {
            (self.wins as f64 / self.total_trades as f64) * 100.0
        }
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = self
            .terminal_reason
            .map(|r| r.to_string())
            .unwrap_or_else(|| "Aborted".to_string());
        write!(
            f,
            "{reason} | trades={} (W{}/L{}) | profit={:.2} | loss={:.2} | net={:+.2}",
            self.total_trades,
            self.wins,
            self.losses,
            self.final_profit,
            self.final_loss,
            self.net_pnl(),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // -- Outcome tests --

    #[test]
    fn test_outcome_display() {
        assert_eq!(format!("{}", Outcome::Win), "WIN");
        assert_eq!(format!("{}", Outcome::Lose), "LOSE");
    }

    #[test]
    fn test_outcome_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Outcome::Win).unwrap(), "\"WIN\"");
        assert_eq!(serde_json::to_string(&Outcome::Lose).unwrap(), "\"LOSE\"");
        let parsed: Outcome = serde_json::from_str("\"LOSE\"").unwrap();
        assert_eq!(parsed, Outcome::Lose);
    }

    #[test]
    fn test_outcome_from_str() {
        assert_eq!("win".parse::<Outcome>().unwrap(), Outcome::Win);
        assert_eq!("LOSE".parse::<Outcome>().unwrap(), Outcome::Lose);
        assert_eq!(" l ".parse::<Outcome>().unwrap(), Outcome::Lose);
        assert!("draw".parse::<Outcome>().is_err());
    }

    // -- WagerRecord tests --

    #[test]
    fn test_record_win_pnl_is_positive_stake() {
        let r = WagerRecord::new(1, Outcome::Win, dec!(0.35), Utc::now());
        assert_eq!(r.profit_loss(), dec!(0.35));
        assert_eq!(r.stake(), dec!(0.35));
    }

    #[test]
    fn test_record_lose_pnl_is_negative_stake() {
        let r = WagerRecord::new(2, Outcome::Lose, dec!(1.74), Utc::now());
        assert_eq!(r.profit_loss(), dec!(-1.74));
        assert_eq!(r.trade(), 2);
    }

    #[test]
    fn test_record_display() {
        let r = WagerRecord::new(3, Outcome::Lose, dec!(2), Utc::now());
        assert_eq!(format!("{r}"), "Trade 3: LOSE | Stake: 2.00 | P/L: -2.00");
    }

    // -- SessionSummary tests --

    fn summary(profit: Decimal, loss: Decimal, wins: u64, losses: u64) -> SessionSummary {
        SessionSummary {
            session_id: Uuid::new_v4(),
            total_trades: wins + losses,
            wins,
            losses,
            final_profit: profit,
            final_loss: loss,
            terminal_reason: Some(TerminalReason::ProfitTarget),
            dropped_records: 0,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_net_pnl() {
        let s = summary(dec!(3), dec!(3), 2, 2);
        assert_eq!(s.net_pnl(), Decimal::ZERO);
        let s = summary(dec!(20.05), dec!(4.3), 5, 3);
        assert_eq!(s.net_pnl(), dec!(15.75));
    }

    #[test]
    fn test_summary_win_rate() {
        let s = summary(dec!(1), dec!(1), 3, 1);
        assert!((s.win_rate() - 75.0).abs() < f64::EPSILON);
        let empty = summary(Decimal::ZERO, Decimal::ZERO, 0, 0);
        assert_eq!(empty.win_rate(), 0.0);
    }

    #[test]
    fn test_terminal_reason_is_threshold() {
        assert!(TerminalReason::ProfitTarget.is_threshold());
        assert!(TerminalReason::LossLimit.is_threshold());
        assert!(!TerminalReason::TradeCap.is_threshold());
        assert!(!TerminalReason::Cancelled.is_threshold());
    }

    #[test]
    fn test_persistence_mode_default_is_strict() {
        assert_eq!(PersistenceMode::default(), PersistenceMode::Strict);
        let parsed: PersistenceMode = serde_json::from_str("\"best_effort\"").unwrap();
        assert_eq!(parsed, PersistenceMode::BestEffort);
    }
}
