//! Risk Oracle Adapters
//!
//! - `HttpRiskOracle`: remote scoring service
//! - `SimulatedRiskOracle`: random scores for paper trading

mod http_oracle;
mod simulated;

pub use http_oracle::{parse_risk_response, HttpRiskOracle};
pub use simulated::SimulatedRiskOracle;
