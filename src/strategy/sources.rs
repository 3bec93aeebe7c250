//! Where staking documents come from.
//!
//! Documents are plain JSON files. The engine's configuration is resolved
//! through an ordered [`ConfigChain`]: the user's custom file, then the
//! default file, then the hardcoded defaults. The first source that yields
//! a document wins; a missing file is never fatal on its own.

use std::fmt;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{RawStakingConfig, StakingConfig, Violation};
use crate::config::AppConfig;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write config file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration from {origin}: {}", join_violations(.violations))]
    Invalid {
        origin: ConfigOrigin,
        violations: Vec<Violation>,
    },

    #[error("No usable configuration (tried: {})", join_paths(.tried))]
    NoSource { tried: Vec<PathBuf> },

    #[error("Invalid value for {field}: {value:?} ({reason})")]
    BadValue {
        field: String,
        value: String,
        reason: String,
    },
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Document I/O
// ---------------------------------------------------------------------------

/// Load a staking document. `Ok(None)` if the file does not exist.
pub fn load_document(path: &Path) -> Result<Option<RawStakingConfig>, ConfigError> {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Config file not found");
            return Ok(None);
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let raw = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(raw))
}

/// Write a staking document as pretty JSON, creating parent directories.
pub fn save_document(raw: &RawStakingConfig, path: &Path) -> Result<(), ConfigError> {
    let write_err = |source: std::io::Error| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    let json = serde_json::to_string_pretty(raw)
        .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    std::fs::write(path, json).map_err(write_err)?;

    info!(path = %path.display(), "Configuration saved");
    Ok(())
}

/// Set a single key on a document from its textual form.
///
/// Only keys already present in the document are changed. Returns
/// `Ok(false)` (and warns) for anything else; `merge` fills missing keys.
/// `stake_ladder` takes a comma-separated list or a JSON array.
pub fn apply_update(raw: &mut RawStakingConfig, key: &str, value: &str) -> Result<bool, ConfigError> {
    if !raw.has_field(key) {
        warn!(key, "Key not found in the configuration");
        return Ok(false);
    }

    let bad = |reason: String| ConfigError::BadValue {
        field: key.to_string(),
        value: value.to_string(),
        reason,
    };
    let decimal = |s: &str| -> Result<Decimal, ConfigError> {
        s.trim().parse::<Decimal>().map_err(|e| bad(e.to_string()))
    };

    match key {
        "initial_stake" => raw.initial_stake = Some(decimal(value)?),
        "martingale_multiplier" => raw.martingale_multiplier = Some(decimal(value)?),
        "take_profit" => raw.take_profit = Some(decimal(value)?),
        "stop_loss" => raw.stop_loss = Some(decimal(value)?),
        "ticks" => {
            raw.ticks = Some(value.trim().parse::<i64>().map_err(|e| bad(e.to_string()))?)
        }
        "stake_ladder" | "stake_list" => {
            let list = value.trim().trim_start_matches('[').trim_end_matches(']');
            let ladder = list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(decimal)
                .collect::<Result<Vec<_>, _>>()?;
            raw.stake_ladder = Some(ladder);
        }
        _ => {
            warn!(key, "Key not found in the configuration");
            return Ok(false);
        }
    }

    info!(key, value, "Configuration value updated");
    Ok(true)
}

/// Overwrite the custom document with the default one (or the builtin
/// defaults if no default document exists).
pub fn reset_custom(custom: &Path, default: &Path) -> Result<RawStakingConfig, ConfigError> {
    let raw = load_document(default)?.unwrap_or_else(RawStakingConfig::builtin);
    save_document(&raw, custom)?;
    info!(
        custom = %custom.display(),
        default = %default.display(),
        "Custom configuration reset to default"
    );
    Ok(raw)
}

/// Result of checking one document on disk.
#[derive(Debug)]
pub enum DocumentCheck {
    Missing,
    Valid,
    Invalid(Vec<Violation>),
    Unreadable(ConfigError),
}

/// Load and validate a single document. Never fails: read and parse
/// errors are reported as [`DocumentCheck::Unreadable`].
pub fn check_document(path: &Path) -> DocumentCheck {
    match load_document(path) {
        Ok(None) => DocumentCheck::Missing,
        Ok(Some(raw)) => {
            let violations = super::validate(&raw);
            if violations.is_empty() {
                DocumentCheck::Valid
            } else {
                DocumentCheck::Invalid(violations)
            }
        }
        Err(e) => DocumentCheck::Unreadable(e),
    }
}

// ---------------------------------------------------------------------------
// Fallback chain
// ---------------------------------------------------------------------------

/// Which source produced the active configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    Custom(PathBuf),
    Default(PathBuf),
    Builtin,
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOrigin::Custom(p) => write!(f, "custom config {}", p.display()),
            ConfigOrigin::Default(p) => write!(f, "default config {}", p.display()),
            ConfigOrigin::Builtin => write!(f, "built-in defaults"),
        }
    }
}

/// One link of the fallback chain.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    CustomFile(PathBuf),
    DefaultFile(PathBuf),
    /// Hardcoded defaults. Written to `persist_to` if that file is missing.
    Builtin { persist_to: Option<PathBuf> },
}

impl ConfigSource {
    pub fn origin(&self) -> ConfigOrigin {
        match self {
            ConfigSource::CustomFile(p) => ConfigOrigin::Custom(p.clone()),
            ConfigSource::DefaultFile(p) => ConfigOrigin::Default(p.clone()),
            ConfigSource::Builtin { .. } => ConfigOrigin::Builtin,
        }
    }

    /// Produce a document, or `None` if this source has nothing to offer.
    pub fn fetch(&self) -> Result<Option<RawStakingConfig>, ConfigError> {
        match self {
            ConfigSource::CustomFile(path) | ConfigSource::DefaultFile(path) => load_document(path),
            ConfigSource::Builtin { persist_to } => {
                let raw = RawStakingConfig::builtin();
                if let Some(path) = persist_to.as_deref().filter(|p| !p.exists()) {
                    // A read-only config directory shouldn't stop a session.
                    if let Err(e) = save_document(&raw, path) {
                        warn!(error = %e, "Could not persist synthesized default configuration");
                    }
                }
                Ok(Some(raw))
            }
        }
    }
}

/// A validated configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: StakingConfig,
    pub origin: ConfigOrigin,
}

/// Ordered list of sources with first-success semantics.
#[derive(Debug, Clone, Default)]
pub struct ConfigChain {
    sources: Vec<ConfigSource>,
}

impl ConfigChain {
    pub fn new(sources: Vec<ConfigSource>) -> Self {
        Self { sources }
    }

    /// custom → default → builtin (builtin only if `synthesize_default`).
    pub fn from_app(app: &AppConfig) -> Self {
        let mut sources = vec![
            ConfigSource::CustomFile(app.paths.custom_config.clone()),
            ConfigSource::DefaultFile(app.paths.default_config.clone()),
        ];
        if app.session.synthesize_default {
            sources.push(ConfigSource::Builtin {
                persist_to: Some(app.paths.default_config.clone()),
            });
        }
        Self::new(sources)
    }

    pub fn sources(&self) -> &[ConfigSource] {
        &self.sources
    }

    /// Walk the chain and validate the first document found.
    ///
    /// An invalid document is rejected outright; it does not fall through
    /// to the next source.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        let mut tried = Vec::new();

        for source in &self.sources {
            let origin = source.origin();
            let Some(raw) = source.fetch()? else {
                info!(source = %origin, "Configuration source unavailable, falling back");
                if let ConfigSource::CustomFile(p) | ConfigSource::DefaultFile(p) = source {
                    tried.push(p.clone());
                }
                continue;
            };

            return match raw.validated() {
                Ok(config) => {
                    info!(source = %origin, %config, "Configuration loaded");
                    Ok(ResolvedConfig { config, origin })
                }
                Err(violations) => {
                    for v in &violations {
                        warn!(source = %origin, field = v.field, "{v}");
                    }
                    Err(ConfigError::Invalid { origin, violations })
                }
            };
        }

        Err(ConfigError::NoSource { tried })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
