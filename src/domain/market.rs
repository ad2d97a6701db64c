use serde::{Deserialize, Serialize};

/// One market data observation for a trading pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub pair_address: String,
    pub base_token_address: String,
    pub base_token_name: String,
    pub base_token_symbol: String,
    pub price_usd: f64,
    pub volume_24h: f64,
    pub liquidity_usd: f64,
    /// Percent change over 24h (e.g. -12.5)
    pub price_change_24h: f64,
}

impl MarketSnapshot {
    /// Snapshot with only a price set, for callers that don't need depth data
    pub fn with_price(pair_address: impl Into<String>, price_usd: f64) -> Self {
        let pair_address = pair_address.into();
        Self {
            base_token_address: pair_address.clone(),
            pair_address,
            base_token_name: String::new(),
            base_token_symbol: String::new(),
            price_usd,
            volume_24h: 0.0,
            liquidity_usd: 0.0,
            price_change_24h: 0.0,
        }
    }
}
