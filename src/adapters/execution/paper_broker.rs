//! Paper broker: fills every well-formed order without touching a chain

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::Side;
use crate::ports::broker::{Broker, BrokerError, ExecutionReport};

#[derive(Debug, Default)]
pub struct PaperBroker {
    latency: Duration,
    submitted: AtomicU64,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated network delay per order
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn orders_submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
}

/// `tx_<unix seconds>_<first 8 chars of token>`
pub fn transaction_id(unix_secs: i64, token_address: &str) -> String {
    let prefix: String = token_address.chars().take(8).collect();
    format!("tx_{}_{}", unix_secs, prefix)
}

#[async_trait]
impl Broker for PaperBroker {
    async fn submit(
        &self,
        side: Side,
        token_address: &str,
        amount: f64,
    ) -> Result<ExecutionReport, BrokerError> {
        if token_address.is_empty() {
            return Err(BrokerError::InvalidParameters("empty token address".to_string()));
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(BrokerError::InvalidParameters(format!("amount {}", amount)));
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.submitted.fetch_add(1, Ordering::Relaxed);

        let now = Utc::now();
        let mut report = ExecutionReport::filled(transaction_id(now.timestamp(), token_address));
        report.message = format!("{} executed for {} (amount {})", side, token_address, amount);
        report.timestamp = now;

        tracing::debug!("Paper {} {} amount={}", side, token_address, amount);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_id_format() {
        assert_eq!(transaction_id(1_700_000_000, "So11111111111111"), "tx_1700000000_So111111");
        assert_eq!(transaction_id(5, "abc"), "tx_5_abc");
    }

    #[tokio::test]
    async fn test_fills_orders() {
        let broker = PaperBroker::new();
        let report = broker.submit(Side::Buy, "TokenAddress123", 100.0).await.unwrap();

        assert!(report.success);
        let tx = report.transaction_id.unwrap();
        assert!(tx.starts_with("tx_"));
        assert!(tx.ends_with("_TokenAdd"));
        assert_eq!(broker.orders_submitted(), 1);
    }

    #[tokio::test]
    async fn test_rejects_bad_amount() {
        let broker = PaperBroker::new();
        assert!(matches!(
            broker.submit(Side::Sell, "Tok", 0.0).await,
            Err(BrokerError::InvalidParameters(_))
        ));
        assert!(broker.submit(Side::Sell, "", 1.0).await.is_err());
        assert_eq!(broker.orders_submitted(), 0);
    }
}
