//! dexcross - Moving-average crossover trading loop for DEX pairs
//!
//! Paper-trades a watchlist of token pairs on a fixed cycle: SMA crossover
//! entries, a one-shot partial exit at a multiple of entry, and a rug-pull
//! risk gate in front of every buy.
//!
//! # Modules
//!
//! - `domain`: Core business logic (Position, PositionLedger, ProfitTaking, Signal, Risk)
//! - `ports`: Trait abstractions (MarketFeed, RiskOracle, Broker, SecretStore)
//! - `strategy`: Signal generation (SmaCrossover, PriceHistory)
//! - `adapters`: External implementations (DexScreener, risk oracles, paper broker, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Cycle orchestrator and risk gate

pub mod domain;
pub mod ports;
pub mod strategy;
pub mod adapters;
pub mod config;
pub mod application;
