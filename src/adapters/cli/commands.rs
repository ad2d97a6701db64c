//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the dexcross trading loop.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::adapters::execution::PaperBroker;
use crate::adapters::market_data::{DexScreenerConfig, DexScreenerFeed};
use crate::adapters::risk::{HttpRiskOracle, SimulatedRiskOracle};
use crate::adapters::secrets::EncryptedFileStore;
use crate::application::CycleOrchestrator;
use crate::config::{load_config, Config, RiskProvider, PASSPHRASE_ENV};
use crate::domain::PositionLedger;
use crate::ports::{RiskOracle, SecretStore};

/// Secret holding the risk oracle API key
pub const RISK_API_KEY_SECRET: &str = "risk_api_key";

/// dexcross - Moving-average crossover trading loop for DEX pairs
#[derive(Parser, Debug)]
#[command(
    name = "dexcross",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Moving-average crossover trading loop for DEX pairs",
    long_about = "dexcross paper-trades a watchlist of DEX pairs: SMA crossover entries, \
                  a one-shot partial exit at 2x entry, and a rug-pull risk gate."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the trading loop
    Run(RunCmd),

    /// Show the persisted ledger
    Status(StatusCmd),

    /// Manage encrypted secrets
    Secret(SecretCmd),
}

/// Start trading loop
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/dexcross.toml")]
    pub config: PathBuf,

    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Show ledger status
#[derive(Parser, Debug)]
pub struct StatusCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/dexcross.toml")]
    pub config: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Manage secrets
#[derive(Parser, Debug)]
pub struct SecretCmd {
    #[command(subcommand)]
    pub action: SecretAction,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/dexcross.toml", global = true)]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum SecretAction {
    /// Store a secret
    Set {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },
    /// Print a secret
    Get {
        #[arg(value_name = "KEY")]
        key: String,
    },
    /// List stored keys
    List,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    match app.command {
        Command::Run(cmd) => run_command(cmd, app.verbose, app.debug).await,
        Command::Status(cmd) => status_command(cmd, app.verbose, app.debug),
        Command::Secret(cmd) => secret_command(cmd, app.verbose, app.debug),
    }
}

/// Pick the log filter: `--debug`, then `--verbose`, then the config level, then warn
pub fn log_filter(verbose: bool, debug: bool, config_level: Option<&str>) -> String {
    if debug {
        "debug".to_string()
    } else if verbose {
        "info".to_string()
    } else {
        config_level.unwrap_or("warn").to_string()
    }
}

/// Initialize logging system
pub fn init_logging(verbose: bool, debug: bool, config_level: Option<&str>) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let directive = log_filter(verbose, debug, config_level);
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("Invalid log level '{}'", directive))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

fn load(path: &Path, verbose: bool, debug: bool) -> Result<Config> {
    let config = load_config(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    init_logging(verbose, debug, config.logging.level.as_deref())?;
    tracing::info!("Config: {}", path.display());
    Ok(config)
}

/// Passphrase from the environment, or an interactive prompt
fn read_passphrase() -> Result<String> {
    if let Ok(passphrase) = std::env::var(PASSPHRASE_ENV) {
        if !passphrase.is_empty() {
            return Ok(passphrase);
        }
    }

    eprint!("Secret store passphrase: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read passphrase")?;
    let passphrase = line.trim_end_matches(['\r', '\n']).to_string();
    if passphrase.is_empty() {
        bail!("No passphrase given (set {} or enter one at the prompt)", PASSPHRASE_ENV);
    }
    Ok(passphrase)
}

fn open_store(config: &Config) -> Result<EncryptedFileStore> {
    let mut store = EncryptedFileStore::new(config.storage.expanded_path());
    let passphrase = read_passphrase()?;
    store
        .initialize(&passphrase)
        .with_context(|| format!("Failed to open secret store {}", store.path().display()))?;
    Ok(store)
}

fn build_risk_oracle(config: &Config, store: &EncryptedFileStore) -> Result<Arc<dyn RiskOracle>> {
    match config.risk.provider {
        RiskProvider::Http => {
            let url = config
                .risk
                .get_api_url()
                .context("risk.api_url is required for the http provider")?;
            let api_key = store.get(RISK_API_KEY_SECRET)?;
            let oracle = HttpRiskOracle::new(&url, &config.risk.chain, config.risk.timeout())
                .context("Failed to create risk oracle")?
                .with_api_key(api_key);
            Ok(Arc::new(oracle))
        }
        RiskProvider::Simulated => {
            tracing::warn!("Using SIMULATED risk scores");
            Ok(Arc::new(SimulatedRiskOracle::new()))
        }
    }
}

/// Handle run command
async fn run_command(cmd: RunCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = load(&cmd.config, verbose, debug)?;
    tracing::info!("Starting dexcross...");

    let store = open_store(&config)?;

    let feed = DexScreenerFeed::with_config(DexScreenerConfig {
        api_base_url: config.market_data.get_api_url(),
        timeout: config.market_data.timeout(),
        max_retries: config.market_data.max_retries,
    })
    .context("Failed to create market feed")?;
    let oracle = build_risk_oracle(&config, &store)?;
    let broker = PaperBroker::new();

    let orchestrator = Arc::new(
        CycleOrchestrator::from_config(&config, Arc::new(feed), oracle, Arc::new(broker))
            .context("Failed to create orchestrator")?,
    );
    tracing::warn!("PAPER TRADING MODE - no real transactions");

    if cmd.once {
        let report = orchestrator.run_cycle().await.context("Cycle failed")?;
        println!(
            "Cycle {}: portfolio ${:.2} (cash ${:.2}), {} buy(s), {} sell(s), {} symbol(s) dropped",
            report.cycle,
            report.valuation.total,
            report.valuation.cash,
            report.buys.len(),
            report.sells.len(),
            report.feed_failures.len()
        );
        if let Some(error) = &report.persistence_error {
            eprintln!("Warning: ledger snapshot not saved: {}", error);
        }
        return Ok(());
    }

    // Setup Ctrl+C handler
    let orch = orchestrator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, finishing current cycle");
            orch.stop().await;
        }
    });

    orchestrator.run().await?;
    tracing::info!("dexcross stopped");
    Ok(())
}

/// Handle status command
fn status_command(cmd: StatusCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = load(&cmd.config, verbose, debug)?;
    let path = config
        .portfolio
        .state_path()
        .context("No portfolio.state_file configured; nothing to report")?;

    let ledger = match PositionLedger::load(&path)? {
        Some(ledger) => ledger,
        None => {
            println!("No ledger snapshot at {} (no cycle has run yet)", path.display());
            return Ok(());
        }
    };

    match cmd.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&ledger)?);
        }
        OutputFormat::Text => print_ledger(&ledger),
    }
    Ok(())
}

fn print_ledger(ledger: &PositionLedger) {
    println!("======================================");
    println!("    dexcross ledger");
    println!("======================================");
    println!("  Initial balance: ${:.2}", ledger.initial_balance());
    println!("  Cash:            ${:.2}", ledger.cash());
    println!("  Realized P&L:    ${:.2}", ledger.realized_pnl());
    println!("  Fills:           {}", ledger.fills().len());
    println!();

    let open: Vec<_> = ledger.open_positions().collect();
    if open.is_empty() {
        println!("  No open positions");
    } else {
        println!("  Open positions:");
        for position in open {
            println!(
                "    {:<10} qty {:>14.6} @ ${:<12.6} trigger ${:.6}{}",
                position.symbol,
                position.quantity(),
                position.entry_price,
                position.partial_sell_price,
                if position.partial_sell_executed() { " (partial sold)" } else { "" }
            );
        }
    }

    if let Some(last) = ledger.fills().last() {
        println!();
        println!(
            "  Last fill: {} {} {:.6} @ ${:.6} at {}",
            last.side,
            last.symbol,
            last.quantity,
            last.price,
            last.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    println!("======================================");
}

/// Handle secret commands
fn secret_command(cmd: SecretCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = load(&cmd.config, verbose, debug)?;
    let mut store = open_store(&config)?;

    match cmd.action {
        SecretAction::Set { key, value } => {
            store.put(&key, &value)?;
            println!("Stored '{}'", key);
        }
        SecretAction::Get { key } => match store.get(&key)? {
            Some(value) => println!("{}", value),
            None => bail!("No secret named '{}'", key),
        },
        SecretAction::List => {
            for key in store.keys()? {
                println!("{}", key);
            }
        }
    }
    Ok(())
}
