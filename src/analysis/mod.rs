//! Trade history analysis.
//!
//! Reads back the CSV trade log and computes aggregate performance
//! metrics: counts, win/loss rate and net profit/loss. Also builds the
//! cumulative profit/loss series and renders it as a terminal chart.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use std::fmt;

use crate::types::WagerRecord;

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Aggregate performance over a trade history.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeMetrics {
    pub total_trades: usize,
    pub total_wins: usize,
    pub total_losses: usize,
    /// Percent of trades won (0–100). 0.0 with no trades.
    pub win_rate: f64,
    /// Percent of trades lost (0–100). 0.0 with no trades.
    pub loss_rate: f64,
    /// Sum of the Profit/Loss column.
    pub total_profit: Decimal,
    /// Deepest fall of the running sum below its prior peak.
    pub max_drawdown: Decimal,
    /// Longest run of consecutive losses.
    pub longest_losing_streak: usize,
}

impl TradeMetrics {
    pub fn from_records(records: &[WagerRecord]) -> Self {
        let total_trades = records.len();
        let total_wins = records.iter().filter(|r| r.outcome().is_win()).count();
        let total_losses = total_trades - total_wins;

        let pct = |n: usize| {
            if total_trades == 0 {
                0.0
            } else {
                (n as f64 / total_trades as f64) * 100.0
            }
        };

        let mut running = Decimal::ZERO;
        let mut peak = Decimal::ZERO;
        let mut max_drawdown = Decimal::ZERO;
        let mut streak = 0usize;
        let mut longest_losing_streak = 0usize;

        for record in records {
            running = running.saturating_add(record.profit_loss());
            peak = peak.max(running);
            max_drawdown = max_drawdown.max(peak.saturating_sub(running));

            if record.outcome().is_win() {
                streak = 0;
            } else {
                streak += 1;
                longest_losing_streak = longest_losing_streak.max(streak);
            }
        }

        Self {
            total_trades,
            total_wins,
            total_losses,
            win_rate: pct(total_wins),
            loss_rate: pct(total_losses),
            total_profit: running,
            max_drawdown,
            longest_losing_streak,
        }
    }
}

impl fmt::Display for TradeMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trade Performance Metrics:")?;
        writeln!(f, "Total Trades: {}", self.total_trades)?;
        writeln!(f, "Total Wins: {}", self.total_wins)?;
        writeln!(f, "Total Losses: {}", self.total_losses)?;
        writeln!(f, "Win Rate: {:.2}%", self.win_rate)?;
        writeln!(f, "Loss Rate: {:.2}%", self.loss_rate)?;
        writeln!(f, "Total Profit/Loss: {:.2}", self.total_profit)?;
        writeln!(f, "Max Drawdown: {:.2}", self.max_drawdown)?;
        write!(f, "Longest Losing Streak: {}", self.longest_losing_streak)
    }
}

// ---------------------------------------------------------------------------
// Cumulative series
// ---------------------------------------------------------------------------

/// Running sum of Profit/Loss, one point per trade, in log order.
pub fn cumulative_pnl(records: &[WagerRecord]) -> Vec<(DateTime<Utc>, Decimal)> {
    records
        .iter()
        .scan(Decimal::ZERO, |total, r| {
            *total = total.saturating_add(r.profit_loss());
            Some((r.timestamp(), *total))
        })
        .collect()
}

/// Render a cumulative series as a plain-text column chart.
///
/// One column per point (long series are down-sampled to `max_width`
/// columns), `height` rows. Columns grow up or down from the zero line.
/// ASCII only.
pub fn render_chart(series: &[(DateTime<Utc>, Decimal)], height: usize, max_width: usize) -> String {
    if series.is_empty() || height == 0 || max_width == 0 {
        return String::from("(no data)");
    }

    // Down-sample by taking the last point of each bucket
    let bucket = series.len().div_ceil(max_width);
    let values: Vec<f64> = series
        .chunks(bucket)
        .filter_map(|c| c.last())
        .map(|(_, v)| v.to_f64().unwrap_or(0.0))
        .collect();

    let max = values.iter().copied().fold(0.0_f64, f64::max);
    let min = values.iter().copied().fold(0.0_f64, f64::min);
    let span = (max - min).max(f64::EPSILON);
    let row_of = |v: f64| (((v - min) / span) * (height - 1) as f64).round() as usize;
    let zero_row = row_of(0.0);

    let mut lines = Vec::with_capacity(height + 1);
    for row in (0..height).rev() {
        let label = min + span * row as f64 / (height - 1).max(1) as f64;
        let cells: String = values
            .iter()
            .map(|&v| {
                let r = row_of(v);
                let filled = if r >= zero_row {
                    row >= zero_row && row <= r
                } else {
                    row <= zero_row && row >= r
                };
                match (filled, row == zero_row) {
                    (true, _) => '#',
                    (false, true) => '-',
                    (false, false) => ' ',
                }
            })
            .collect();
        lines.push(format!("{label:>10.2} |{cells}"));
    }

    if let (Some((first, _)), Some((last, _))) = (series.first(), series.last()) {
        lines.push(format!("{:>10} +{}", "", "-".repeat(values.len())));
        lines.push(format!(
            "{:>12}{} .. {}",
            "",
            first.format("%Y-%m-%d %H:%M:%S"),
            last.format("%Y-%m-%d %H:%M:%S")
        ));
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
