use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default price multiple at which the partial sell fires
pub const DEFAULT_PARTIAL_SELL_MULTIPLE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Open,
    Closed,
}

/// A long exposure in a single symbol.
///
/// `quantity > 0` holds exactly while `status == Open`. The partial-sell flag
/// is one-way: once set it is never cleared for the lifetime of the position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    quantity: f64,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub partial_sell_price: f64,
    partial_sell_executed: bool,
    status: Status,
}

#[derive(Debug, Error, PartialEq)]
pub enum PositionError {
    #[error("Position is already closed")]
    AlreadyClosed,
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(f64),
    #[error("Invalid entry price: {0}")]
    InvalidEntryPrice(f64),
}

impl Position {
    pub fn new(
        symbol: impl Into<String>,
        quantity: f64,
        entry_price: f64,
        trigger_multiple: f64,
    ) -> Result<Self, PositionError> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(PositionError::InvalidQuantity(quantity));
        }
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(PositionError::InvalidEntryPrice(entry_price));
        }

        Ok(Self {
            symbol: symbol.into(),
            quantity,
            entry_price,
            entry_time: Utc::now(),
            partial_sell_price: entry_price * trigger_multiple,
            partial_sell_executed: false,
            status: Status::Open,
        })
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == Status::Open
    }

    pub fn partial_sell_executed(&self) -> bool {
        self.partial_sell_executed
    }

    /// True while the one-shot partial sell is still armed and `price` has reached it
    pub fn partial_sell_due(&self, price: f64) -> bool {
        self.is_open() && !self.partial_sell_executed && price >= self.partial_sell_price
    }

    /// Consume the partial-sell trigger. Returns false if it was already consumed.
    pub fn mark_partial_sell(&mut self) -> bool {
        if self.partial_sell_executed {
            return false;
        }
        self.partial_sell_executed = true;
        true
    }

    /// Remove up to `requested` units and return how many were actually removed.
    ///
    /// Never goes below zero; reaching exactly zero closes the position.
    pub fn reduce(&mut self, requested: f64) -> Result<f64, PositionError> {
        if self.status != Status::Open {
            return Err(PositionError::AlreadyClosed);
        }
        if !requested.is_finite() || requested <= 0.0 {
            return Err(PositionError::InvalidQuantity(requested));
        }

        let actual = requested.min(self.quantity);
        self.quantity -= actual;
        if self.quantity == 0.0 {
            self.status = Status::Closed;
        }
        Ok(actual)
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.quantity
    }
}
