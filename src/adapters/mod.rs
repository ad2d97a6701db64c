//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Market Data: DexScreener pair snapshots
//! - Risk: HTTP and simulated rug-pull scoring
//! - Execution: paper broker
//! - Secrets: encrypted file store
//! - CLI: Command-line interface handlers

pub mod market_data;
pub mod risk;
pub mod execution;
pub mod secrets;
pub mod cli;

pub use cli::CliApp;
pub use execution::PaperBroker;
pub use market_data::DexScreenerFeed;
pub use risk::{HttpRiskOracle, SimulatedRiskOracle};
pub use secrets::EncryptedFileStore;
