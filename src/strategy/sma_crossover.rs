//! SMA Crossover
//!
//! Golden cross (fast crosses above slow) -> buy.
//! Death cross (fast crosses below slow) -> sell.
//! Anything else, including too little history, -> hold with zero confidence.

use crate::domain::Signal;

use super::params::{StrategyConfig, DEFAULT_FAST_WINDOW, DEFAULT_SLOW_WINDOW};
use super::SignalEngine;

/// Mean of the `window` values ending at index `end` (inclusive).
///
/// `None` if the window does not fit in `series`.
pub fn simple_moving_average(series: &[f64], window: usize, end: usize) -> Option<f64> {
    if window == 0 || end >= series.len() || end + 1 < window {
        return None;
    }
    let slice = &series[end + 1 - window..=end];
    Some(slice.iter().sum::<f64>() / window as f64)
}

#[derive(Debug, Clone)]
pub struct SmaCrossover {
    fast_window: usize,
    slow_window: usize,
}

impl Default for SmaCrossover {
    fn default() -> Self {
        Self::new(DEFAULT_FAST_WINDOW, DEFAULT_SLOW_WINDOW)
    }
}

impl From<&StrategyConfig> for SmaCrossover {
    fn from(config: &StrategyConfig) -> Self {
        Self::new(config.fast_window, config.slow_window)
    }
}

impl SmaCrossover {
    pub fn new(fast_window: usize, slow_window: usize) -> Self {
        Self {
            fast_window,
            slow_window,
        }
    }

    pub fn fast_window(&self) -> usize {
        self.fast_window
    }

    pub fn slow_window(&self) -> usize {
        self.slow_window
    }

    /// (fast, slow) averages at index `end`
    fn averages_at(&self, history: &[f64], end: usize) -> Option<(f64, f64)> {
        let fast = simple_moving_average(history, self.fast_window, end)?;
        let slow = simple_moving_average(history, self.slow_window, end)?;
        Some((fast, slow))
    }
}

impl SignalEngine for SmaCrossover {
    fn required_history(&self) -> usize {
        self.slow_window
    }

    fn generate_signal(&self, history: &[f64], current_price: f64) -> Signal {
        debug_assert!(current_price > 0.0, "current price must be positive");
        debug_assert!(!history.is_empty(), "history must not be empty");

        if history.len() < self.slow_window || history.len() < 2 {
            return Signal::hold();
        }

        let last = history.len() - 1;
        // With exactly `slow_window` closes the previous slow average does not exist yet
        let (Some((prev_fast, prev_slow)), Some((curr_fast, curr_slow))) =
            (self.averages_at(history, last - 1), self.averages_at(history, last))
        else {
            return Signal::hold();
        };

        let confidence = Signal::confidence_from_averages(curr_fast, curr_slow);

        if prev_fast <= prev_slow && curr_fast > curr_slow {
            Signal::buy(current_price, confidence)
        } else if prev_fast >= prev_slow && curr_fast < curr_slow {
            Signal::sell(current_price, confidence)
        } else {
            Signal::hold()
        }
    }
}
