use martingale::analysis::{cumulative_pnl, TradeMetrics};
use martingale::engine::outcome::{CoinFlip, ScriptedOutcomes};
use martingale::engine::session::{run_session, SessionLimits, StakingEngine};
use martingale::storage::{load_trade_history, CsvTradeLog, MemoryRecorder};
use martingale::types::{Outcome, TerminalReason};
use rust_decimal_macros::dec;
use tempfile::TempDir;

use crate::common::{ladder_config, staking_config};

use Outcome::{Lose as L, Win as W};

#[test]
fn test_session_writes_readable_log() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("results/trade-history.csv");
    let cfg = staking_config(dec!(3), dec!(100));

    let mut log = CsvTradeLog::new(&path);
    let summary = run_session(&cfg, &mut ScriptedOutcomes::new([L, L, W, W]), &mut log).unwrap();

    assert_eq!(summary.terminal_reason, Some(TerminalReason::ProfitTarget));
    assert_eq!(summary.total_trades, 3);
    assert_eq!(log.rows_written(), 3);

    let records = load_trade_history(&path).unwrap().unwrap();
    let outcomes: Vec<_> = records.iter().map(|r| r.outcome()).collect();
    assert_eq!(outcomes, vec![L, L, W]);
    let pnl: Vec<_> = records.iter().map(|r| r.profit_loss()).collect();
    assert_eq!(pnl, vec![dec!(-1), dec!(-2), dec!(4)]);

    // The log and the summary agree
    let metrics = TradeMetrics::from_records(&records);
    assert_eq!(metrics.total_trades as u64, summary.total_trades);
    assert_eq!(metrics.total_profit, summary.net_pnl());
    assert_eq!(cumulative_pnl(&records).last().map(|(_, v)| *v), Some(dec!(1)));
}

#[test]
fn test_second_session_appends_to_same_log() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.csv");
    let cfg = staking_config(dec!(1), dec!(100));

    for _ in 0..2 {
        let mut log = CsvTradeLog::new(&path);
        run_session(&cfg, &mut ScriptedOutcomes::new([W]), &mut log).unwrap();
    }

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.matches("Timestamp,Trade,Outcome,Stake,Profit/Loss").count(), 1);
    assert_eq!(load_trade_history(&path).unwrap().unwrap().len(), 2);
}

#[test]
fn test_long_losing_streak_holds_last_rung() {
    let cfg = ladder_config(&[dec!(1), dec!(2)], dec!(3), dec!(1000), dec!(1000));
    let engine = StakingEngine::new(
        cfg,
        SessionLimits {
            max_trades: 8,
            ..Default::default()
        },
    );
    let sink = MemoryRecorder::new();
    let summary = engine
        .run_session(&mut ScriptedOutcomes::new([L, L, L, L, L, W, L, W]), &mut sink.clone())
        .unwrap();

    assert_eq!(summary.terminal_reason, Some(TerminalReason::TradeCap));
    let stakes: Vec<_> = sink.records().iter().map(|r| r.stake()).collect();
    // 2 * 3 from the second loss on, then back to 1 after each win
    assert_eq!(
        stakes,
        vec![dec!(1), dec!(6), dec!(6), dec!(6), dec!(6), dec!(6), dec!(1), dec!(6)]
    );
    assert_eq!(summary.final_loss, dec!(26));
    assert_eq!(summary.final_profit, dec!(12));
}

#[test]
fn test_builtin_ladder_stop_loss() {
    let cfg = martingale::strategy::RawStakingConfig::builtin().validated().unwrap();
    let sink = MemoryRecorder::new();
    let summary = run_session(&cfg, &mut ScriptedOutcomes::new(vec![L; 20]), &mut sink.clone()).unwrap();

    // 0.35 + 0.86 + 1.70 + 3.48 + 7.10 + 14.60 crosses 20
    let stakes: Vec<_> = sink.records().iter().map(|r| r.stake()).collect();
    assert_eq!(
        stakes,
        vec![dec!(0.35), dec!(0.86), dec!(1.70), dec!(3.48), dec!(7.10), dec!(14.6)]
    );
    assert_eq!(summary.terminal_reason, Some(TerminalReason::LossLimit));
    assert_eq!(summary.final_loss, dec!(28.09));
}

#[test]
fn test_seeded_sessions_are_reproducible() {
    let cfg = staking_config(dec!(15), dec!(30));

    let run = |seed| {
        let sink = MemoryRecorder::new();
        let summary = run_session(&cfg, &mut CoinFlip::seeded(seed), &mut sink.clone()).unwrap();
        let outcomes: Vec<_> = sink.records().iter().map(|r| r.outcome()).collect();
        (summary, outcomes)
    };

    let (first, outcomes) = run(42);
    let (second, replayed) = run(42);
    assert_eq!(outcomes, replayed);
    assert_eq!(first.total_trades, second.total_trades);
    assert_eq!(first.net_pnl(), second.net_pnl());
    assert_eq!(outcomes.len() as u64, first.total_trades);
    assert!(first.terminal_reason.is_some_and(|r| r.is_threshold()));
}
