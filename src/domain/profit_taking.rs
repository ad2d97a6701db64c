//! Profit Taking
//!
//! Fixed-multiple partial exit: when price reaches `partial_sell_price`
//! (2x entry by default) a fraction of the position is sold, once.
//!
//! Ordering matters here. The position's partial-sell flag is consumed when
//! the intent is *generated*, not when the fill is confirmed. A sell that later
//! fails at the broker therefore does not re-arm the trigger, and repeated
//! scans before confirmation never emit a second intent.

use std::collections::HashMap;

use tracing::info;

use super::intent::{SellIntent, SellReason};
use super::ledger::PositionLedger;

/// Default fraction of the position sold at the trigger
pub const DEFAULT_PARTIAL_SELL_RATIO: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct ProfitTakingPolicy {
    partial_sell_ratio: f64,
}

impl Default for ProfitTakingPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PARTIAL_SELL_RATIO)
    }
}

impl ProfitTakingPolicy {
    pub fn new(partial_sell_ratio: f64) -> Self {
        Self { partial_sell_ratio }
    }

    pub fn partial_sell_ratio(&self) -> f64 {
        self.partial_sell_ratio
    }

    /// Emit one sell intent per open position whose trigger fired this cycle.
    ///
    /// Only the partial-sell flag is touched; quantity and status change later
    /// through `PositionLedger::apply_fill`.
    pub fn scan(
        &self,
        ledger: &mut PositionLedger,
        current_prices: &HashMap<String, f64>,
    ) -> Vec<SellIntent> {
        let due: Vec<(String, f64, f64)> = ledger
            .open_positions()
            .filter_map(|position| {
                let price = *current_prices.get(&position.symbol)?;
                if !position.partial_sell_due(price) {
                    return None;
                }
                let quantity = position.quantity() * self.partial_sell_ratio;
                (quantity > 0.0).then(|| (position.symbol.clone(), quantity, price))
            })
            .collect();

        let mut intents = Vec::with_capacity(due.len());
        for (symbol, quantity, price) in due {
            if !ledger.mark_partial_sell(&symbol) {
                continue;
            }
            info!(
                "Partial sell triggered for {}: {:.6} units at ${:.6}",
                symbol, quantity, price
            );
            intents.push(SellIntent {
                symbol,
                quantity,
                price,
                reason: SellReason::PartialProfitTake,
            });
        }
        intents
    }
}
