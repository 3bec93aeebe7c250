//! Application configuration loaded from TOML.
//!
//! Reads `martingale.toml` (if present) and deserializes it into strongly
//! typed structs. Every field has a default, so a missing file or a
//! partial file is fine. The resulting [`AppConfig`] is passed explicitly
//! to every component that needs a path or a session limit.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::PersistenceMode;

/// Default application config file name.
pub const DEFAULT_APP_CONFIG: &str = "martingale.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    /// User-level staking document, tried first.
    pub custom_config: PathBuf,
    /// Fallback staking document; synthesized here if missing.
    pub default_config: PathBuf,
    /// Append-only CSV trade log.
    pub trade_history: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            custom_config: PathBuf::from("config/custom-config.json"),
            default_config: PathBuf::from("config/default-config.json"),
            trade_history: PathBuf::from("results/trade-history.csv"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    /// Hard cap on wagers per session, for thresholds that never trigger.
    pub max_trades: u64,
    pub persistence: PersistenceMode,
    /// Seed for a reproducible coin flip. Entropy when unset.
    pub seed: Option<u64>,
    /// Fall back to the hardcoded defaults when no document exists.
    pub synthesize_default: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_trades: 100_000,
            persistence: PersistenceMode::Strict,
            seed: None,
            synthesize_default: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file. Defaults if the file is absent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No application config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = AppConfig::load(dir.path().join("martingale.toml")).unwrap();
        assert_eq!(cfg.paths.custom_config, PathBuf::from("config/custom-config.json"));
        assert_eq!(cfg.paths.trade_history, PathBuf::from("results/trade-history.csv"));
        assert_eq!(cfg.session.max_trades, 100_000);
        assert_eq!(cfg.session.persistence, PersistenceMode::Strict);
        assert!(cfg.session.seed.is_none());
        assert!(cfg.session.synthesize_default);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("martingale.toml");
        fs::write(
            &path,
            r#"
[paths]
trade_history = "out/history.csv"

[session]
persistence = "best_effort"
seed = 7
"#,
        )
        .unwrap();

        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.paths.trade_history, PathBuf::from("out/history.csv"));
        assert_eq!(cfg.paths.default_config, PathBuf::from("config/default-config.json"));
        assert_eq!(cfg.session.persistence, PersistenceMode::BestEffort);
        assert_eq!(cfg.session.seed, Some(7));
        assert_eq!(cfg.session.max_trades, 100_000);
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[session\nmax_trades = ").unwrap();
        let err = AppConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.toml"));
    }
}
