//! Domain Layer - Core business logic for the dexcross trading loop
//!
//! Pure types and state transitions with no I/O beyond the ledger snapshot.
//! All external interactions happen through the ports layer.
//!
//! - `position`: single-symbol exposure and its open/closed lifecycle
//! - `ledger`: cash + positions, the only mutable state shared across cycles
//! - `profit_taking`: one-shot partial sell at a price multiple of entry
//! - `signal`: buy/sell/hold decisions with stop and target levels
//! - `risk`: rug-pull risk levels and gate decisions
//! - `token_filter`: liquidity/volume/list screening of pairs
//! - `market`: market data snapshot shared by feed and filter
//! - `intent`: buy/sell intents handed from policy to execution

pub mod position;
pub mod ledger;
pub mod profit_taking;
pub mod signal;
pub mod risk;
pub mod token_filter;
pub mod market;
pub mod intent;

pub use position::{Position, Status, PositionError, DEFAULT_PARTIAL_SELL_MULTIPLE};
pub use ledger::{PositionLedger, LedgerError, Side, Fill, Valuation};
pub use profit_taking::{ProfitTakingPolicy, DEFAULT_PARTIAL_SELL_RATIO};
pub use signal::{Signal, SignalType};
pub use risk::{RiskLevel, RiskAssessment, UnknownRiskPolicy, GateDecision};
pub use token_filter::{TokenFilter, FilterSettings, FilterRejection};
pub use market::MarketSnapshot;
pub use intent::{BuyIntent, SellIntent, SellReason};
