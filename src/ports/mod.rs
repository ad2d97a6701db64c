//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Market data (pair snapshots)
//! - Rug-pull risk scoring
//! - Order execution
//! - Credential storage

pub mod market_feed;
pub mod risk_oracle;
pub mod broker;
pub mod secret_store;
pub mod mocks;

pub use market_feed::{MarketFeed, FeedError};
pub use risk_oracle::{RiskOracle, OracleError};
pub use broker::{Broker, BrokerError, ExecutionReport};
pub use secret_store::{SecretStore, SecretError};
