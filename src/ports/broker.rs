use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Side;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BrokerError {
    #[error("Order rejected: {0}")]
    Rejected(String),
    #[error("Broker unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Outcome of a submitted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionReport {
    pub fn filled(transaction_id: impl Into<String>) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id.into()),
            message: "Trade executed successfully".to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_id: None,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Order execution venue.
///
/// `amount` is the quote notional for buys and the token quantity for sells.
/// A returned report with `success == false` counts as a failed order.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn submit(
        &self,
        side: Side,
        token_address: &str,
        amount: f64,
    ) -> Result<ExecutionReport, BrokerError>;

    /// Submit and fold an unsuccessful report into `BrokerError::Rejected`
    async fn execute(
        &self,
        side: Side,
        token_address: &str,
        amount: f64,
    ) -> Result<ExecutionReport, BrokerError> {
        let report = self.submit(side, token_address, amount).await?;
        if report.success {
            Ok(report)
        } else {
            Err(BrokerError::Rejected(report.message))
        }
    }
}
