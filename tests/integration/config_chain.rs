use martingale::config::AppConfig;
use martingale::strategy::sources::{self, ConfigChain, ConfigError, ConfigOrigin, ConfigSource};
use martingale::strategy::{RawStakingConfig, ViolationKind};
use rust_decimal_macros::dec;
use std::path::Path;
use tempfile::TempDir;

fn app_in(dir: &Path) -> AppConfig {
    let mut app = AppConfig::default();
    app.paths.custom_config = dir.join("config/custom-config.json");
    app.paths.default_config = dir.join("config/default-config.json");
    app.paths.trade_history = dir.join("results/trade-history.csv");
    app
}

#[test]
fn test_empty_directory_falls_back_to_builtin_and_persists() {
    let dir = TempDir::new().unwrap();
    let app = app_in(dir.path());

    let resolved = ConfigChain::from_app(&app).resolve().unwrap();
    assert_eq!(resolved.origin, ConfigOrigin::Builtin);
    assert_eq!(resolved.config.initial_stake(), dec!(0.35));
    assert_eq!(resolved.config.stake_ladder().len(), 11);

    // The synthesized document is picked up as the default next time
    assert!(app.paths.default_config.exists());
    let again = ConfigChain::from_app(&app).resolve().unwrap();
    assert_eq!(again.origin, ConfigOrigin::Default(app.paths.default_config.clone()));
    assert_eq!(again.config, resolved.config);
}

#[test]
fn test_custom_document_wins() {
    let dir = TempDir::new().unwrap();
    let app = app_in(dir.path());
    sources::save_document(&RawStakingConfig::builtin(), &app.paths.default_config).unwrap();

    let mut custom = sources::reset_custom(&app.paths.custom_config, &app.paths.default_config).unwrap();
    sources::apply_update(&mut custom, "take_profit", "50").unwrap();
    sources::save_document(&custom, &app.paths.custom_config).unwrap();

    let resolved = ConfigChain::from_app(&app).resolve().unwrap();
    assert_eq!(resolved.origin, ConfigOrigin::Custom(app.paths.custom_config.clone()));
    assert_eq!(resolved.config.take_profit(), dec!(50));
}

#[test]
fn test_missing_stop_loss_is_reported_and_not_skipped() {
    let dir = TempDir::new().unwrap();
    let app = app_in(dir.path());
    std::fs::create_dir_all(dir.path().join("config")).unwrap();
    std::fs::write(
        &app.paths.custom_config,
        r#"{"initial_stake": 1, "stake_list": [1, 2], "martingale_multiplier": 2, "take_profit": 5, "ticks": 1}"#,
    )
    .unwrap();
    sources::save_document(&RawStakingConfig::builtin(), &app.paths.default_config).unwrap();

    match ConfigChain::from_app(&app).resolve() {
        Err(ConfigError::Invalid { origin, violations }) => {
            assert_eq!(origin, ConfigOrigin::Custom(app.paths.custom_config.clone()));
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].field, "stop_loss");
            assert_eq!(violations[0].kind, ViolationKind::Missing);
        }
        other => panic!("expected invalid config, got {other:?}"),
    }
}

#[test]
fn test_no_source_lists_paths_tried() {
    let dir = TempDir::new().unwrap();
    let mut app = app_in(dir.path());
    app.session.synthesize_default = false;

    match ConfigChain::from_app(&app).resolve() {
        Err(ConfigError::NoSource { tried }) => {
            assert_eq!(tried, vec![app.paths.custom_config.clone(), app.paths.default_config.clone()]);
        }
        other => panic!("expected no source, got {other:?}"),
    }
    assert!(!app.paths.default_config.exists());
}

#[test]
fn test_builtin_without_persistence() {
    let chain = ConfigChain::new(vec![ConfigSource::Builtin { persist_to: None }]);
    let resolved = chain.resolve().unwrap();
    assert_eq!(resolved.config.stop_loss(), dec!(20));
}

#[test]
fn test_app_config_from_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("martingale.toml");
    std::fs::write(
        &path,
        "[session]\nmax_trades = 250\npersistence = \"best_effort\"\nseed = 9\n",
    )
    .unwrap();

    let app = AppConfig::load(&path).unwrap();
    assert_eq!(app.session.max_trades, 250);
    assert_eq!(app.session.seed, Some(9));
    assert_eq!(app.paths.trade_history, std::path::PathBuf::from("results/trade-history.csv"));
}
