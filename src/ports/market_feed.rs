use async_trait::async_trait;
use thiserror::Error;

use crate::domain::MarketSnapshot;

/// Market feed error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("Market feed unavailable: {0}")]
    Unavailable(String),

    #[error("Data parsing error: {0}")]
    Parse(String),

    #[error("Pair not found: {0}")]
    PairNotFound(String),
}

/// Source of current market data for a trading pair
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// Latest snapshot for `pair_address`. `price_usd` is positive on success.
    async fn fetch(&self, pair_address: &str) -> Result<MarketSnapshot, FeedError>;

    /// Feed name for logging
    fn name(&self) -> &str {
        "market-feed"
    }
}
