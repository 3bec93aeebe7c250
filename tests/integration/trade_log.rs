use chrono::{Duration, TimeZone, Utc};
use martingale::analysis::{cumulative_pnl, render_chart, TradeMetrics};
use martingale::storage::{load_trade_history, CsvTradeLog, TradeRecorder};
use martingale::types::{Outcome, WagerRecord};
use rust_decimal_macros::dec;
use tempfile::TempDir;

fn history(n: u64) -> Vec<WagerRecord> {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
    (1..=n)
        .map(|i| {
            let outcome = if i % 3 == 0 { Outcome::Win } else { Outcome::Lose };
            WagerRecord::new(i, outcome, dec!(0.35) * rust_decimal::Decimal::from(i), start + Duration::seconds(i as i64))
        })
        .collect()
}

#[test]
fn test_log_preserves_order_and_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trade-history.csv");
    let written = history(25);

    let mut log = CsvTradeLog::new(&path);
    for record in &written {
        log.append(record).unwrap();
    }

    let read = load_trade_history(&path).unwrap().unwrap();
    assert_eq!(read, written);
    assert_eq!(read[24].stake(), dec!(8.75));
    assert_eq!(read[23].profit_loss(), dec!(8.40));
}

#[test]
fn test_analysis_of_logged_history() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trade-history.csv");

    let mut log = CsvTradeLog::new(&path);
    for record in history(6) {
        log.append(&record).unwrap();
    }

    // L 0.35, L 0.70, W 1.05, L 1.40, L 1.75, W 2.10
    let records = load_trade_history(&path).unwrap().unwrap();
    let metrics = TradeMetrics::from_records(&records);
    assert_eq!(metrics.total_trades, 6);
    assert_eq!(metrics.total_wins, 2);
    assert_eq!(metrics.total_losses, 4);
    assert_eq!(metrics.total_profit, dec!(-1.05));
    assert_eq!(metrics.longest_losing_streak, 2);

    let report = metrics.to_string();
    assert!(report.contains("Win Rate: 33.33%"));
    assert!(report.contains("Loss Rate: 66.67%"));

    let chart = render_chart(&cumulative_pnl(&records), 6, 40);
    assert!(chart.contains("2024-03-01 09:30:01 .. 2024-03-01 09:30:06"));
}

#[test]
fn test_empty_log_file_has_no_records() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trade-history.csv");
    std::fs::write(&path, "Timestamp,Trade,Outcome,Stake,Profit/Loss\n").unwrap();

    let records = load_trade_history(&path).unwrap().unwrap();
    assert!(records.is_empty());
    assert_eq!(TradeMetrics::from_records(&records).win_rate, 0.0);
}
