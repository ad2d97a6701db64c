//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    Config, ConfigError, load_config, RiskProvider, SymbolEntry, PASSPHRASE_ENV,
};
