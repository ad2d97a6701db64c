//! Position Ledger
//!
//! Cash balance plus one position slot per symbol. Every mutation goes
//! through `apply_fill`, which either applies completely or not at all.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::position::{Position, Status, DEFAULT_PARTIAL_SELL_MULTIPLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient funds for {symbol}: cost {cost:.6}, cash {cash:.6}")]
    InsufficientFunds { symbol: String, cost: f64, cash: f64 },

    #[error("No open position for {0}")]
    NoPosition(String),

    #[error("Position already open for {0}")]
    PositionAlreadyOpen(String),

    #[error("Invalid fill: {0}")]
    InvalidFill(String),

    #[error("Ledger persistence error: {0}")]
    Persistence(String),
}

/// A confirmed execution as booked by the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub symbol: String,
    pub side: Side,
    /// Quantity actually booked (sells are clamped to the held amount)
    pub quantity: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    /// Realized P&L against the entry price (sells only)
    pub realized_pnl: Option<f64>,
}

/// Point-in-time valuation of the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub cash: f64,
    pub holdings_value: f64,
    pub total: f64,
    /// Open symbols that had no current price and were left out of `total`
    pub unpriced: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionLedger {
    initial_balance: f64,
    cash: f64,
    partial_sell_multiple: f64,
    positions: BTreeMap<String, Position>,
    /// Closed positions displaced by a fresh buy in the same symbol
    archived: Vec<Position>,
    fills: Vec<Fill>,
    realized_pnl: f64,
}

impl PositionLedger {
    pub fn new(initial_balance: f64) -> Self {
        Self::with_trigger_multiple(initial_balance, DEFAULT_PARTIAL_SELL_MULTIPLE)
    }

    pub fn with_trigger_multiple(initial_balance: f64, partial_sell_multiple: f64) -> Self {
        Self {
            initial_balance,
            cash: initial_balance,
            partial_sell_multiple,
            positions: BTreeMap::new(),
            archived: Vec::new(),
            fills: Vec::new(),
            realized_pnl: 0.0,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn archived(&self) -> &[Position] {
        &self.archived
    }

    /// Latest position for `symbol`, open or closed
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_open_position(&self, symbol: &str) -> bool {
        self.positions.get(symbol).is_some_and(Position::is_open)
    }

    /// Open positions in symbol order
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values().filter(|p| p.is_open())
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Consume the partial-sell trigger on an open position.
    ///
    /// Returns true only on the false -> true transition.
    pub fn mark_partial_sell(&mut self, symbol: &str) -> bool {
        match self.positions.get_mut(symbol) {
            Some(position) if position.is_open() => position.mark_partial_sell(),
            _ => false,
        }
    }

    /// Book a confirmed execution.
    ///
    /// Buys are all-or-nothing against available cash and never replace an open
    /// position. Sells are clamped to the held quantity.
    pub fn apply_fill(
        &mut self,
        symbol: &str,
        quantity: f64,
        price: f64,
        side: Side,
    ) -> Result<Fill, LedgerError> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(LedgerError::InvalidFill(format!(
                "quantity must be > 0, got {}",
                quantity
            )));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(LedgerError::InvalidFill(format!(
                "price must be > 0, got {}",
                price
            )));
        }

        match side {
            Side::Buy => self.apply_buy(symbol, quantity, price),
            Side::Sell => self.apply_sell(symbol, quantity, price),
        }
    }

    fn apply_buy(&mut self, symbol: &str, quantity: f64, price: f64) -> Result<Fill, LedgerError> {
        if self.has_open_position(symbol) {
            return Err(LedgerError::PositionAlreadyOpen(symbol.to_string()));
        }

        let cost = quantity * price;
        if self.cash < cost {
            return Err(LedgerError::InsufficientFunds {
                symbol: symbol.to_string(),
                cost,
                cash: self.cash,
            });
        }

        // Build the position before touching cash so a rejection leaves no trace
        let position = Position::new(symbol, quantity, price, self.partial_sell_multiple)
            .map_err(|e| LedgerError::InvalidFill(e.to_string()))?;

        self.cash -= cost;
        if let Some(previous) = self.positions.insert(symbol.to_string(), position) {
            self.archived.push(previous);
        }

        let fill = Fill {
            symbol: symbol.to_string(),
            side: Side::Buy,
            quantity,
            price,
            timestamp: Utc::now(),
            realized_pnl: None,
        };
        self.fills.push(fill.clone());
        Ok(fill)
    }

    fn apply_sell(&mut self, symbol: &str, quantity: f64, price: f64) -> Result<Fill, LedgerError> {
        let position = self
            .positions
            .get_mut(symbol)
            .filter(|p| p.is_open())
            .ok_or_else(|| LedgerError::NoPosition(symbol.to_string()))?;

        let entry_price = position.entry_price;
        let sold = position
            .reduce(quantity)
            .map_err(|e| LedgerError::InvalidFill(e.to_string()))?;
        let closed = position.status() == Status::Closed;

        let pnl = (price - entry_price) * sold;
        self.cash += sold * price;
        self.realized_pnl += pnl;

        if closed {
            tracing::info!("Closed position in {}", symbol);
        }

        let fill = Fill {
            symbol: symbol.to_string(),
            side: Side::Sell,
            quantity: sold,
            price,
            timestamp: Utc::now(),
            realized_pnl: Some(pnl),
        };
        self.fills.push(fill.clone());
        Ok(fill)
    }

    /// Cash plus open positions marked at `prices`.
    ///
    /// Symbols with no price are excluded from the total, never valued at zero.
    pub fn valuation(&self, prices: &HashMap<String, f64>) -> Valuation {
        let mut holdings_value = 0.0;
        let mut unpriced = Vec::new();

        for position in self.open_positions() {
            match prices.get(&position.symbol) {
                Some(price) => holdings_value += position.market_value(*price),
                None => unpriced.push(position.symbol.clone()),
            }
        }

        if !unpriced.is_empty() {
            warn!(
                "No current price for {} open position(s), excluded from valuation: {}",
                unpriced.len(),
                unpriced.join(", ")
            );
        }

        Valuation {
            cash: self.cash,
            holdings_value,
            total: self.cash + holdings_value,
            unpriced,
        }
    }

    pub fn portfolio_value(&self, prices: &HashMap<String, f64>) -> f64 {
        self.valuation(prices).total
    }

    /// Return relative to the initial balance, in percent
    pub fn return_pct(&self, prices: &HashMap<String, f64>) -> f64 {
        if self.initial_balance <= 0.0 {
            return 0.0;
        }
        (self.portfolio_value(prices) - self.initial_balance) / self.initial_balance * 100.0
    }

    /// Load a snapshot written by `save`. Missing file yields `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>, LedgerError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Persistence(e.to_string()))?;
        let ledger: Self = serde_json::from_str(&content)
            .map_err(|e| LedgerError::Persistence(e.to_string()))?;
        Ok(Some(ledger))
    }

    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| LedgerError::Persistence(e.to_string()))?;
            }
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| LedgerError::Persistence(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| LedgerError::Persistence(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn prices(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    #[test]
    fn test_buy_creates_position() {
        let mut ledger = PositionLedger::new(1000.0);
        ledger.apply_fill("AAA", 100.0, 1.0, Side::Buy).unwrap();

        assert_eq!(ledger.cash(), 900.0);
        let position = ledger.position("AAA").unwrap();
        assert!(position.is_open());
        assert_eq!(position.quantity(), 100.0);
        assert_eq!(position.partial_sell_price, 2.0);
        assert!(!position.partial_sell_executed());
    }

    #[test]
    fn test_buy_insufficient_funds_leaves_state_untouched() {
        let mut ledger = PositionLedger::new(50.0);
        let result = ledger.apply_fill("AAA", 100.0, 1.0, Side::Buy);

        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        assert_eq!(ledger.cash(), 50.0);
        assert!(ledger.position("AAA").is_none());
        assert!(ledger.fills().is_empty());
    }

    #[test]
    fn test_buy_exact_cash_allowed() {
        let mut ledger = PositionLedger::new(100.0);
        ledger.apply_fill("AAA", 100.0, 1.0, Side::Buy).unwrap();
        assert_eq!(ledger.cash(), 0.0);
    }

    #[test]
    fn test_buy_rejected_when_open() {
        let mut ledger = PositionLedger::new(1000.0);
        ledger.apply_fill("AAA", 100.0, 1.0, Side::Buy).unwrap();
        let result = ledger.apply_fill("AAA", 10.0, 1.5, Side::Buy);

        assert_eq!(result.unwrap_err(), LedgerError::PositionAlreadyOpen("AAA".to_string()));
        assert_eq!(ledger.cash(), 900.0);
        assert_eq!(ledger.position("AAA").unwrap().quantity(), 100.0);
        assert_eq!(ledger.position("AAA").unwrap().entry_price, 1.0);
    }

    #[test]
    fn test_buy_after_close_archives_previous() {
        let mut ledger = PositionLedger::new(1000.0);
        ledger.apply_fill("AAA", 100.0, 1.0, Side::Buy).unwrap();
        ledger.apply_fill("AAA", 100.0, 1.2, Side::Sell).unwrap();
        ledger.apply_fill("AAA", 50.0, 2.0, Side::Buy).unwrap();

        assert_eq!(ledger.archived().len(), 1);
        assert_eq!(ledger.archived()[0].status(), Status::Closed);
        assert_eq!(ledger.position("AAA").unwrap().entry_price, 2.0);
        assert_eq!(ledger.position("AAA").unwrap().partial_sell_price, 4.0);
    }

    #[test]
    fn test_sell_without_position() {
        let mut ledger = PositionLedger::new(1000.0);
        let result = ledger.apply_fill("AAA", 1.0, 1.0, Side::Sell);
        assert_eq!(result.unwrap_err(), LedgerError::NoPosition("AAA".to_string()));
        assert_eq!(ledger.cash(), 1000.0);
    }

    #[test]
    fn test_sell_on_closed_position_is_no_position() {
        let mut ledger = PositionLedger::new(1000.0);
        ledger.apply_fill("AAA", 10.0, 1.0, Side::Buy).unwrap();
        ledger.apply_fill("AAA", 10.0, 1.0, Side::Sell).unwrap();
        let result = ledger.apply_fill("AAA", 1.0, 1.0, Side::Sell);
        assert!(matches!(result, Err(LedgerError::NoPosition(_))));
    }

    #[test]
    fn test_oversell_clamps_credit() {
        let mut ledger = PositionLedger::new(1000.0);
        ledger.apply_fill("AAA", 100.0, 1.0, Side::Buy).unwrap();
        let fill = ledger.apply_fill("AAA", 500.0, 3.0, Side::Sell).unwrap();

        assert_eq!(fill.quantity, 100.0);
        assert_eq!(ledger.cash(), 900.0 + 300.0);
        let position = ledger.position("AAA").unwrap();
        assert_eq!(position.quantity(), 0.0);
        assert_eq!(position.status(), Status::Closed);
        assert_relative_eq!(ledger.realized_pnl(), 200.0);
    }

    #[test]
    fn test_partial_sell_scenario() {
        let mut ledger = PositionLedger::new(1000.0);
        ledger.apply_fill("AAA", 100.0, 1.0, Side::Buy).unwrap();
        assert!(ledger.mark_partial_sell("AAA"));
        ledger.apply_fill("AAA", 50.0, 2.5, Side::Sell).unwrap();

        assert_relative_eq!(ledger.cash(), 1025.0);
        let position = ledger.position("AAA").unwrap();
        assert_eq!(position.quantity(), 50.0);
        assert!(position.partial_sell_executed());
        assert!(position.is_open());
    }

    #[test]
    fn test_invalid_fill_rejected() {
        let mut ledger = PositionLedger::new(1000.0);
        assert!(matches!(
            ledger.apply_fill("AAA", 0.0, 1.0, Side::Buy),
            Err(LedgerError::InvalidFill(_))
        ));
        assert!(matches!(
            ledger.apply_fill("AAA", 1.0, f64::INFINITY, Side::Buy),
            Err(LedgerError::InvalidFill(_))
        ));
        assert_eq!(ledger.cash(), 1000.0);
    }

    #[test]
    fn test_cash_never_negative_over_random_walk() {
        let mut ledger = PositionLedger::new(500.0);
        let symbols = ["AAA", "BBB", "CCC"];
        for i in 0..300u32 {
            let symbol = symbols[(i % 3) as usize];
            let price = 0.5 + ((i * 7) % 13) as f64 * 0.25;
            let quantity = 1.0 + ((i * 11) % 17) as f64 * 10.0;
            let side = if i % 4 == 0 { Side::Sell } else { Side::Buy };
            let _ = ledger.apply_fill(symbol, quantity, price, side);
            assert!(ledger.cash() >= 0.0);
            for position in ledger.positions() {
                assert!(position.quantity() >= 0.0);
                assert_eq!(position.quantity() > 0.0, position.is_open());
            }
        }
    }

    #[test]
    fn test_conservation_at_fill_prices() {
        let mut ledger = PositionLedger::new(1000.0);
        ledger.apply_fill("AAA", 100.0, 2.0, Side::Buy).unwrap();
        // Marked at the fill price, bookkeeping creates no value
        assert_relative_eq!(ledger.portfolio_value(&prices(&[("AAA", 2.0)])), 1000.0);

        ledger.apply_fill("AAA", 40.0, 3.0, Side::Sell).unwrap();
        let value = ledger.portfolio_value(&prices(&[("AAA", 3.0)]));
        assert_relative_eq!(value, 1000.0 + (3.0 - 2.0) * 100.0);
    }

    #[test]
    fn test_valuation_excludes_unpriced() {
        let mut ledger = PositionLedger::new(1000.0);
        ledger.apply_fill("AAA", 100.0, 1.0, Side::Buy).unwrap();
        ledger.apply_fill("BBB", 10.0, 5.0, Side::Buy).unwrap();

        let valuation = ledger.valuation(&prices(&[("AAA", 1.5)]));
        assert_relative_eq!(valuation.cash, 850.0);
        assert_relative_eq!(valuation.holdings_value, 150.0);
        assert_relative_eq!(valuation.total, 1000.0);
        assert_eq!(valuation.unpriced, vec!["BBB".to_string()]);
    }

    #[test]
    fn test_return_pct() {
        let mut ledger = PositionLedger::new(1000.0);
        ledger.apply_fill("AAA", 100.0, 1.0, Side::Buy).unwrap();
        assert_relative_eq!(ledger.return_pct(&prices(&[("AAA", 2.0)])), 10.0);
    }

    #[test]
    fn test_save_and_load_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("ledger.json");

        let mut ledger = PositionLedger::new(1000.0);
        ledger.apply_fill("AAA", 100.0, 1.0, Side::Buy).unwrap();
        ledger.mark_partial_sell("AAA");
        ledger.save(&path).unwrap();

        let restored = PositionLedger::load(&path).unwrap().unwrap();
        assert_eq!(restored.cash(), 900.0);
        assert!(restored.position("AAA").unwrap().partial_sell_executed());
        assert_eq!(restored.fills().len(), 1);
    }

    #[test]
    fn test_load_missing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let result = PositionLedger::load(&dir.path().join("missing.json")).unwrap();
        assert!(result.is_none());
    }
}
