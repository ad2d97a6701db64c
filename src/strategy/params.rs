//! Strategy Parameters
//!
//! Window lengths and sizing for the crossover strategy.

use serde::{Deserialize, Serialize};

pub const DEFAULT_FAST_WINDOW: usize = 10;
pub const DEFAULT_SLOW_WINDOW: usize = 20;
pub const DEFAULT_BUY_CONFIDENCE_THRESHOLD: f64 = 0.3;

/// Main strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Fast SMA window (closes)
    pub fast_window: usize,
    /// Slow SMA window (closes)
    pub slow_window: usize,
    /// Buy only when signal confidence is strictly above this
    pub buy_confidence_threshold: f64,
    /// Quote currency spent per buy
    pub trade_size: f64,
    /// Closes retained per symbol
    pub history_capacity: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            fast_window: DEFAULT_FAST_WINDOW,
            slow_window: DEFAULT_SLOW_WINDOW,
            buy_confidence_threshold: DEFAULT_BUY_CONFIDENCE_THRESHOLD,
            trade_size: 100.0,
            history_capacity: 200,
        }
    }
}

impl StrategyConfig {
    pub fn with_windows(mut self, fast: usize, slow: usize) -> Self {
        self.fast_window = fast;
        self.slow_window = slow;
        self
    }

    pub fn with_trade_size(mut self, trade_size: f64) -> Self {
        self.trade_size = trade_size;
        self
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.fast_window == 0 || self.fast_window >= self.slow_window {
            return Err(ParamsError::InvalidWindows(self.fast_window, self.slow_window));
        }
        if !(0.0..=1.0).contains(&self.buy_confidence_threshold) {
            return Err(ParamsError::InvalidConfidenceThreshold(
                self.buy_confidence_threshold,
            ));
        }
        if !self.trade_size.is_finite() || self.trade_size <= 0.0 {
            return Err(ParamsError::InvalidTradeSize(self.trade_size));
        }
        // One extra close is needed to compare the previous step
        if self.history_capacity <= self.slow_window {
            return Err(ParamsError::InvalidHistoryCapacity(
                self.history_capacity,
                self.slow_window,
            ));
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParamsError {
    #[error("Invalid windows: fast {0}, slow {1} (need 0 < fast < slow)")]
    InvalidWindows(usize, usize),
    #[error("Invalid buy confidence threshold: {0} (must be 0-1)")]
    InvalidConfidenceThreshold(f64),
    #[error("Invalid trade size: {0} (must be > 0)")]
    InvalidTradeSize(f64),
    #[error("Invalid history capacity: {0} (must exceed slow window {1})")]
    InvalidHistoryCapacity(usize, usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StrategyConfig::default();
        assert_eq!(config.fast_window, 10);
        assert_eq!(config.slow_window, 20);
        assert_eq!(config.buy_confidence_threshold, 0.3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = StrategyConfig::default().with_windows(3, 7).with_trade_size(25.0);
        assert_eq!(config.fast_window, 3);
        assert_eq!(config.slow_window, 7);
        assert_eq!(config.trade_size, 25.0);
    }

    #[test]
    fn test_invalid_windows() {
        let config = StrategyConfig::default().with_windows(20, 20);
        assert!(matches!(config.validate(), Err(ParamsError::InvalidWindows(20, 20))));

        let config = StrategyConfig::default().with_windows(0, 5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_threshold() {
        let mut config = StrategyConfig::default();
        config.buy_confidence_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ParamsError::InvalidConfidenceThreshold(_))
        ));
    }

    #[test]
    fn test_invalid_trade_size_and_capacity() {
        let config = StrategyConfig::default().with_trade_size(0.0);
        assert!(matches!(config.validate(), Err(ParamsError::InvalidTradeSize(_))));

        let mut config = StrategyConfig::default();
        config.history_capacity = 20;
        assert!(matches!(
            config.validate(),
            Err(ParamsError::InvalidHistoryCapacity(20, 20))
        ));
    }
}
