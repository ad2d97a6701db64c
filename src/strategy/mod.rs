//! Strategy Layer - Moving-average crossover signals
//!
//! - `SmaCrossover`: golden/death cross of a fast and slow simple moving average
//! - `PriceHistory`: bounded per-symbol close series fed to the engine each cycle
//!
//! Engines are pure: same history and price in, same signal out.

pub mod params;
pub mod sma_crossover;
pub mod price_history;

pub use params::{StrategyConfig, ParamsError};
pub use sma_crossover::{SmaCrossover, simple_moving_average};
pub use price_history::PriceHistory;

use crate::domain::Signal;

/// Turns a close series plus the live price into a trading signal
pub trait SignalEngine: Send + Sync {
    /// Minimum history length below which the engine can only hold
    fn required_history(&self) -> usize;

    /// `history` is chronological (oldest first). Callers guarantee it is
    /// non-empty and that `current_price > 0`.
    fn generate_signal(&self, history: &[f64], current_price: f64) -> Signal;
}
