//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml structure.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::adapters::market_data::DEXSCREENER_API;
use crate::domain::{FilterSettings, UnknownRiskPolicy, DEFAULT_PARTIAL_SELL_MULTIPLE, DEFAULT_PARTIAL_SELL_RATIO};
use crate::strategy::params::{
    StrategyConfig, DEFAULT_BUY_CONFIDENCE_THRESHOLD, DEFAULT_FAST_WINDOW, DEFAULT_SLOW_WINDOW,
};

/// Environment variable holding the secret store passphrase
pub const PASSPHRASE_ENV: &str = "DEXCROSS_PASSPHRASE";

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub portfolio: PortfolioSection,
    pub strategy: StrategySection,
    #[serde(default)]
    pub schedule: ScheduleSection,
    pub risk: RiskSection,
    #[serde(default)]
    pub market_data: MarketDataSection,
    /// Absent section disables token filtering
    #[serde(default)]
    pub filters: Option<FilterSettings>,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub logging: LoggingSection,
    pub symbols: Vec<SymbolEntry>,
}

/// Portfolio configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioSection {
    /// Starting cash in quote currency
    pub initial_balance: f64,
    /// Fraction of a position sold when the profit trigger fires
    #[serde(default = "default_partial_sell_ratio")]
    pub partial_sell_ratio: f64,
    /// Trigger price as a multiple of entry price
    #[serde(default = "default_partial_sell_multiple")]
    pub partial_sell_multiple: f64,
    /// Optional JSON ledger snapshot, reloaded at startup
    #[serde(default)]
    pub state_file: Option<String>,
}

impl PortfolioSection {
    /// State file path with `~` expanded
    pub fn state_path(&self) -> Option<PathBuf> {
        self.state_file.as_deref().map(expand_path)
    }
}

/// Strategy configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct StrategySection {
    #[serde(default = "default_fast_window")]
    pub fast_window: usize,
    #[serde(default = "default_slow_window")]
    pub slow_window: usize,
    #[serde(default = "default_buy_confidence_threshold")]
    pub buy_confidence_threshold: f64,
    /// Quote currency spent per buy
    pub trade_size: f64,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

/// Cycle scheduling section
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSection {
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
    #[serde(default = "default_run_duration_hours")]
    pub run_duration_hours: f64,
    /// Pause after a cycle fails outright
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval_secs(),
            run_duration_hours: default_run_duration_hours(),
            error_backoff_secs: default_error_backoff_secs(),
        }
    }
}

impl ScheduleSection {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn run_duration(&self) -> Duration {
        Duration::from_secs_f64(self.run_duration_hours * 3600.0)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

/// Where risk scores come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskProvider {
    #[default]
    Http,
    /// Random scores, for paper trading without a scoring service
    Simulated,
}

/// Risk oracle configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct RiskSection {
    #[serde(default)]
    pub provider: RiskProvider,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_chain")]
    pub chain: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Required: what to do when the oracle cannot be reached
    pub unknown_risk_policy: UnknownRiskPolicy,
}

impl RiskSection {
    /// Get API URL with environment variable override
    /// Checks DEXCROSS_RISK_API_URL env var first, falls back to config value
    pub fn get_api_url(&self) -> Option<String> {
        std::env::var("DEXCROSS_RISK_API_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .or_else(|| self.api_url.clone().filter(|url| !url.is_empty()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Market data configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct MarketDataSection {
    #[serde(default = "default_market_api_url")]
    pub api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for MarketDataSection {
    fn default() -> Self {
        Self {
            api_url: default_market_api_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl MarketDataSection {
    /// Get API URL with environment variable override
    /// Checks DEXCROSS_MARKET_API_URL env var first, falls back to config value
    pub fn get_api_url(&self) -> String {
        std::env::var("DEXCROSS_MARKET_API_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.api_url.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Secret storage section
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    /// Encrypted secrets file (NEVER commit this file!)
    #[serde(default = "default_secrets_path")]
    pub secrets_path: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            secrets_path: default_secrets_path(),
        }
    }
}

impl StorageSection {
    pub fn expanded_path(&self) -> PathBuf {
        expand_path(&self.secrets_path)
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default)]
    pub level: Option<String>,
}

/// One traded symbol
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SymbolEntry {
    pub symbol: String,
    /// DEX pair queried for market data
    pub pair_address: String,
    /// Token sent to the oracle and broker; taken from market data when absent
    #[serde(default)]
    pub token_address: Option<String>,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

fn default_partial_sell_ratio() -> f64 {
    DEFAULT_PARTIAL_SELL_RATIO
}

fn default_partial_sell_multiple() -> f64 {
    DEFAULT_PARTIAL_SELL_MULTIPLE
}

fn default_fast_window() -> usize {
    DEFAULT_FAST_WINDOW
}

fn default_slow_window() -> usize {
    DEFAULT_SLOW_WINDOW
}

fn default_buy_confidence_threshold() -> f64 {
    DEFAULT_BUY_CONFIDENCE_THRESHOLD
}

fn default_history_capacity() -> usize {
    200
}

fn default_cycle_interval_secs() -> u64 {
    300
}

fn default_run_duration_hours() -> f64 {
    24.0
}

fn default_error_backoff_secs() -> u64 {
    60
}

fn default_chain() -> String {
    "solana".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_market_api_url() -> String {
    DEXSCREENER_API.to_string()
}

fn default_secrets_path() -> String {
    "~/.dexcross/secrets.enc".to_string()
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate portfolio section
        let initial = self.portfolio.initial_balance;
        if !initial.is_finite() || initial <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "initial_balance must be > 0, got {}",
                initial
            )));
        }

        let ratio = self.portfolio.partial_sell_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "partial_sell_ratio must be in (0, 1], got {}",
                ratio
            )));
        }

        if !(self.portfolio.partial_sell_multiple > 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "partial_sell_multiple must be > 1, got {}",
                self.portfolio.partial_sell_multiple
            )));
        }

        // Validate strategy section
        StrategyConfig::from(self)
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        // Validate schedule
        if self.schedule.cycle_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "cycle_interval_secs must be > 0".to_string(),
            ));
        }

        if self.schedule.error_backoff_secs == 0 {
            return Err(ConfigError::ValidationError(
                "error_backoff_secs must be > 0".to_string(),
            ));
        }

        let hours = self.schedule.run_duration_hours;
        if !hours.is_finite() || hours <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "run_duration_hours must be > 0, got {}",
                hours
            )));
        }

        // Validate risk oracle
        if self.risk.provider == RiskProvider::Http && self.risk.get_api_url().is_none() {
            return Err(ConfigError::ValidationError(
                "risk.api_url is required when provider = \"http\"".to_string(),
            ));
        }

        if self.risk.timeout_secs == 0 || self.market_data.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        if self.market_data.api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "market_data.api_url cannot be empty".to_string(),
            ));
        }

        // Validate filters
        if let Some(filters) = &self.filters {
            if filters.min_price_change_24h > filters.max_price_change_24h {
                return Err(ConfigError::ValidationError(format!(
                    "min_price_change_24h ({}) exceeds max_price_change_24h ({})",
                    filters.min_price_change_24h, filters.max_price_change_24h
                )));
            }
        }

        // Validate symbols
        if self.symbols.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one [[symbols]] entry is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.symbols {
            if entry.symbol.is_empty() || entry.pair_address.is_empty() {
                return Err(ConfigError::ValidationError(
                    "symbol and pair_address cannot be empty".to_string(),
                ));
            }
            if !seen.insert(entry.symbol.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate symbol {}",
                    entry.symbol
                )));
            }
        }

        Ok(())
    }
}

// Conversion from Config to StrategyConfig
impl From<&Config> for StrategyConfig {
    fn from(config: &Config) -> Self {
        StrategyConfig {
            fast_window: config.strategy.fast_window,
            slow_window: config.strategy.slow_window,
            buy_confidence_threshold: config.strategy.buy_confidence_threshold,
            trade_size: config.strategy.trade_size,
            history_capacity: config.strategy.history_capacity,
        }
    }
}
