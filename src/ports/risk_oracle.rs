use async_trait::async_trait;
use thiserror::Error;

use crate::domain::RiskAssessment;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Risk oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed risk response: {0}")]
    Malformed(String),
}

/// External rug-pull risk scoring
#[async_trait]
pub trait RiskOracle: Send + Sync {
    async fn check(&self, token_address: &str) -> Result<RiskAssessment, OracleError>;
}
