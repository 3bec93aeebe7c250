//! MARTINGALE — coin-flip staking simulator.
//!
//! Entry point. Loads the application config, initialises structured
//! logging, resolves the staking configuration through the fallback chain
//! and runs a session, or analyses / edits what a previous run left behind.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

use martingale::analysis::{cumulative_pnl, render_chart, TradeMetrics};
use martingale::config::{AppConfig, DEFAULT_APP_CONFIG};
use martingale::engine;
use martingale::engine::outcome::{CoinFlip, OutcomeSource, ScriptedOutcomes};
use martingale::engine::session::{SessionError, SessionLimits, StakingEngine};
use martingale::storage::{self, CsvTradeLog, MemoryRecorder, TradeRecorder};
use martingale::strategy::sources::{self, ConfigChain, ConfigError, DocumentCheck};
use martingale::strategy::{validate, RawStakingConfig};
use martingale::types::PersistenceMode;

const BANNER: &str = r#"
  __  __    _    ____ _____ ___ _   _  ____    _    _     _____
 |  \/  |  / \  |  _ \_   _|_ _| \ | |/ ___|  / \  | |   | ____|
 | |\/| | / _ \ | |_) || |  | ||  \| | |  _  / _ \ | |   |  _|
 | |  | |/ ___ \|  _ < | |  | || |\  | |_| |/ ___ \| |___| |___
 |_|  |_/_/   \_\_| \_\|_| |___|_| \_|\____/_/   \_\_____|_____|

  Coin-flip staking simulator
"#;

/// Exit code when no usable staking configuration could be obtained.
const EXIT_NO_CONFIG: u8 = 2;

/// Martingale staking simulator.
#[derive(Parser, Debug)]
#[command(name = "martingale")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Application config file (TOML)
    #[arg(long, global = true, default_value = DEFAULT_APP_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a staking session (the default)
    Run(RunArgs),

    /// Analyse the trade history log
    Analyze(AnalyzeArgs),

    /// Inspect or edit the staking configuration documents
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Seed the coin flip for a reproducible session
    #[arg(long)]
    seed: Option<u64>,

    /// Hard cap on wagers for this session
    #[arg(long)]
    max_trades: Option<u64>,

    /// Keep going (with a warning) when a trade fails to persist
    #[arg(long)]
    best_effort: bool,

    /// Trade history CSV to append to
    #[arg(long)]
    history: Option<PathBuf>,

    /// Keep the trade log in memory only
    #[arg(long)]
    dry_run: bool,

    /// Replay a fixed outcome sequence instead of flipping a coin (e.g. `lose,lose,win`)
    #[arg(long)]
    outcomes: Option<String>,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Trade history CSV to read
    #[arg(long)]
    history: Option<PathBuf>,

    /// Draw the cumulative profit/loss chart
    #[arg(long)]
    chart: bool,

    /// Chart height in rows
    #[arg(long, default_value_t = 12)]
    height: usize,

    /// Maximum chart width in columns
    #[arg(long, default_value_t = 72)]
    width: usize,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the configuration a session would run with
    Show,
    /// Validate the custom and default documents
    Validate,
    /// Set values in the custom document (`key=value`). Only keys already
    /// in the document are changed; use `merge` to add missing ones.
    Set {
        #[arg(required = true)]
        updates: Vec<String>,
    },
    /// Fill fields missing from the custom document with default values
    Merge,
    /// Overwrite the custom document with the default one
    Reset,
    /// Create the default and custom documents if they are missing
    Init,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    init_logging();

    let app = AppConfig::load(&cli.config)?;

    match cli.command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run(&app, args).await,
        Commands::Analyze(args) => analyze(&app, args),
        Commands::Config(cmd) => config(&app, cmd),
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn run(app: &AppConfig, args: RunArgs) -> Result<ExitCode> {
    let resolved = match ConfigChain::from_app(app).resolve() {
        Ok(resolved) => resolved,
        Err(e) => {
            report_config_error(&e);
            return Ok(ExitCode::from(EXIT_NO_CONFIG));
        }
    };

    println!("{BANNER}");

    let mut limits = SessionLimits::from_app(app);
    if let Some(max) = args.max_trades {
        limits.max_trades = max;
    }
    if args.best_effort {
        limits.persistence = PersistenceMode::BestEffort;
    }

    let outcomes: Box<dyn OutcomeSource + Send> = match (&args.outcomes, args.seed.or(app.session.seed)) {
        (Some(script), _) => Box::new(ScriptedOutcomes::parse(script).context("Invalid --outcomes script")?),
        (None, Some(seed)) => {
            info!(seed, "Using seeded coin flip");
            Box::new(CoinFlip::seeded(seed))
        }
        (None, None) => Box::new(CoinFlip::from_entropy()),
    };

    let history = args.history.unwrap_or_else(|| app.paths.trade_history.clone());
    let sink: Box<dyn TradeRecorder + Send> = if args.dry_run {
        info!("Dry run: trade log kept in memory");
        Box::new(MemoryRecorder::new())
    } else {
        info!(path = %history.display(), "Appending to trade history");
        Box::new(CsvTradeLog::new(&history))
    };

    info!(
        source = %resolved.origin,
        ticks = resolved.config.ticks(),
        "Starting trading bot. Press Ctrl+C to stop."
    );

    let staking = StakingEngine::new(resolved.config, limits);
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Could not listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    match engine::run_until(staking, outcomes, sink, shutdown).await {
        Ok(summary) => {
            println!("{summary}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => match e.downcast_ref::<SessionError>() {
            Some(session_err) => {
                eprintln!("Session aborted: {session_err}");
                eprintln!("Before abort: {}", session_err.summary());
                Ok(ExitCode::FAILURE)
            }
            None => Err(e),
        },
    }
}

fn report_config_error(e: &ConfigError) {
    eprintln!("Failed to load configuration. Exiting.");
    eprintln!("  {e}");
    if let ConfigError::Invalid { violations, .. } = e {
        for v in violations {
            eprintln!("  - {v}");
        }
    }
}

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

fn analyze(app: &AppConfig, args: AnalyzeArgs) -> Result<ExitCode> {
    let path = args.history.unwrap_or_else(|| app.paths.trade_history.clone());

    let records = match storage::load_trade_history(&path)? {
        Some(records) if !records.is_empty() => records,
        Some(_) => {
            println!("No data available for analysis.");
            return Ok(ExitCode::SUCCESS);
        }
        None => {
            println!("Trade history file not found at {}.", path.display());
            return Ok(ExitCode::SUCCESS);
        }
    };

    println!("{}", TradeMetrics::from_records(&records));

    if args.chart {
        println!();
        println!("Cumulative Profit/Loss Over Time");
        println!("{}", render_chart(&cumulative_pnl(&records), args.height, args.width));
    }

    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn config(app: &AppConfig, cmd: ConfigCommand) -> Result<ExitCode> {
    let custom = &app.paths.custom_config;
    let default = &app.paths.default_config;

    match cmd {
        ConfigCommand::Show => match ConfigChain::from_app(app).resolve() {
            Ok(resolved) => {
                println!("Current configuration ({}):", resolved.origin);
                println!("{}", serde_json::to_string_pretty(&resolved.config.to_raw())?);
            }
            Err(e) => {
                report_config_error(&e);
                return Ok(ExitCode::from(EXIT_NO_CONFIG));
            }
        },

        ConfigCommand::Validate => {
            let mut invalid = false;
            let mut found = false;
            for path in [custom, default] {
                match sources::check_document(path) {
                    DocumentCheck::Missing => println!("{}: not found", path.display()),
                    DocumentCheck::Valid => {
                        found = true;
                        println!("{}: valid", path.display());
                    }
                    DocumentCheck::Invalid(violations) => {
                        found = true;
                        invalid = true;
                        println!("{}: validation failed", path.display());
                        for v in &violations {
                            println!("  - {v}");
                        }
                    }
                    DocumentCheck::Unreadable(e) => {
                        found = true;
                        invalid = true;
                        println!("{}: {e}", path.display());
                    }
                }
            }
            if invalid || !found {
                return Ok(ExitCode::FAILURE);
            }
        }

        ConfigCommand::Set { updates } => {
            let mut raw = match sources::load_document(custom)? {
                Some(raw) => raw,
                None => {
                    info!(path = %custom.display(), "Custom configuration not found, creating it from default");
                    sources::load_document(default)?.unwrap_or_else(RawStakingConfig::builtin)
                }
            };
            for update in &updates {
                let (key, value) = update
                    .split_once('=')
                    .with_context(|| format!("Expected key=value, got {update:?}"))?;
                if !sources::apply_update(&mut raw, key.trim(), value)? {
                    println!("  skipped {}: not present in the document", key.trim());
                }
            }
            sources::save_document(&raw, custom)?;
            report_violations(&raw);
        }

        ConfigCommand::Merge => {
            let defaults = sources::load_document(default)?.unwrap_or_else(RawStakingConfig::builtin);
            let merged = sources::load_document(custom)?
                .unwrap_or_default()
                .merge_with(&defaults);
            sources::save_document(&merged, custom)?;
            println!("Custom configuration merged with default values.");
            report_violations(&merged);
        }

        ConfigCommand::Reset => {
            sources::reset_custom(custom, default)?;
            println!("Custom configuration reset to match the default configuration.");
        }

        ConfigCommand::Init => {
            if default.exists() {
                println!("{} already exists", default.display());
            } else {
                sources::save_document(&RawStakingConfig::builtin(), default)?;
                println!("Created {}", default.display());
            }
            if custom.exists() {
                println!("{} already exists", custom.display());
            } else {
                sources::reset_custom(custom, default)?;
                println!("Created {}", custom.display());
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn report_violations(raw: &RawStakingConfig) {
    for v in validate(raw) {
        println!("  warning: {v}");
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("martingale=info"));

    let json_logging = std::env::var("MARTINGALE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
