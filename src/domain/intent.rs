//! Order intents produced during a cycle and consumed in the same cycle

use serde::{Deserialize, Serialize};

/// Why a sell was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SellReason {
    /// Price crossed the partial-sell trigger
    PartialProfitTake,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellIntent {
    pub symbol: String,
    /// Token units to sell
    pub quantity: f64,
    /// Cycle price the intent was generated at, used to book the fill
    pub price: f64,
    pub reason: SellReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyIntent {
    pub symbol: String,
    /// Address handed to the broker
    pub token_address: String,
    /// Quote currency to spend
    pub notional: f64,
    /// Token units the ledger books on success (`notional / price`)
    pub quantity: f64,
    pub price: f64,
    pub confidence: f64,
}

impl BuyIntent {
    pub fn new(
        symbol: impl Into<String>,
        token_address: impl Into<String>,
        notional: f64,
        price: f64,
        confidence: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            token_address: token_address.into(),
            notional,
            quantity: notional / price,
            price,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_intent_quantity() {
        let intent = BuyIntent::new("AAA", "TokenAAA", 100.0, 0.5, 0.8);
        assert_eq!(intent.quantity, 200.0);
        assert_eq!(intent.notional, 100.0);
    }
}
