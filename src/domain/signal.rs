use std::fmt;

use serde::{Deserialize, Serialize};

/// Stop/target multipliers applied to the current price on a buy
pub const BUY_STOP_LOSS_FACTOR: f64 = 0.95;
pub const BUY_TAKE_PROFIT_FACTOR: f64 = 1.10;

/// Stop/target multipliers applied to the current price on a sell
pub const SELL_STOP_LOSS_FACTOR: f64 = 1.05;
pub const SELL_TAKE_PROFIT_FACTOR: f64 = 0.90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalType::Buy => write!(f, "Buy"),
            SignalType::Sell => write!(f, "Sell"),
            SignalType::Hold => write!(f, "Hold"),
        }
    }
}

/// Trading decision for one symbol in one cycle.
///
/// Price levels are `None` exactly when the signal is a hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_type: SignalType,
    pub confidence: f64,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

impl Signal {
    pub fn hold() -> Self {
        Self {
            signal_type: SignalType::Hold,
            confidence: 0.0,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn buy(current_price: f64, confidence: f64) -> Self {
        Self {
            signal_type: SignalType::Buy,
            confidence,
            entry_price: Some(current_price),
            stop_loss: Some(current_price * BUY_STOP_LOSS_FACTOR),
            take_profit: Some(current_price * BUY_TAKE_PROFIT_FACTOR),
        }
    }

    pub fn sell(current_price: f64, confidence: f64) -> Self {
        Self {
            signal_type: SignalType::Sell,
            confidence,
            entry_price: Some(current_price),
            stop_loss: Some(current_price * SELL_STOP_LOSS_FACTOR),
            take_profit: Some(current_price * SELL_TAKE_PROFIT_FACTOR),
        }
    }

    /// Confidence from the fast/slow average spread: `min(10 * |fast/slow - 1|, 1)`
    pub fn confidence_from_averages(fast: f64, slow: f64) -> f64 {
        (10.0 * (fast / slow - 1.0).abs()).min(1.0)
    }

    /// Buy strictly above the confidence threshold
    pub fn is_buy_above(&self, threshold: f64) -> bool {
        self.signal_type == SignalType::Buy && self.confidence > threshold
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.confidence.is_nan() || self.confidence < 0.0 || self.confidence > 1.0 {
            return Err(format!("Invalid confidence value: {}", self.confidence));
        }

        let has_levels =
            self.entry_price.is_some() && self.stop_loss.is_some() && self.take_profit.is_some();
        match self.signal_type {
            SignalType::Hold if self.entry_price.is_some() => {
                Err("Hold signal must not carry price levels".to_string())
            }
            SignalType::Buy | SignalType::Sell if !has_levels => {
                Err(format!("{} signal is missing price levels", self.signal_type))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hold_signal() {
        let signal = Signal::hold();
        assert_eq!(signal.signal_type, SignalType::Hold);
        assert_eq!(signal.confidence, 0.0);
        assert!(signal.entry_price.is_none());
        assert!(signal.stop_loss.is_none());
        assert!(signal.take_profit.is_none());
        assert!(signal.validate().is_ok());
    }

    #[test]
    fn test_buy_levels() {
        let signal = Signal::buy(2.0, 0.5);
        assert_eq!(signal.entry_price, Some(2.0));
        assert_relative_eq!(signal.stop_loss.unwrap(), 1.9);
        assert_relative_eq!(signal.take_profit.unwrap(), 2.2);
    }

    #[test]
    fn test_sell_levels() {
        let signal = Signal::sell(2.0, 0.5);
        assert_relative_eq!(signal.stop_loss.unwrap(), 2.1);
        assert_relative_eq!(signal.take_profit.unwrap(), 1.8);
    }

    #[test]
    fn test_confidence_calculation() {
        assert_relative_eq!(Signal::confidence_from_averages(110.0, 100.0), 1.0);
        assert_relative_eq!(Signal::confidence_from_averages(101.0, 100.0), 0.1, epsilon = 1e-12);
        assert_relative_eq!(Signal::confidence_from_averages(99.0, 100.0), 0.1, epsilon = 1e-12);
        assert_relative_eq!(Signal::confidence_from_averages(100.0, 100.0), 0.0);
    }

    #[test]
    fn test_buy_threshold_is_strict() {
        assert!(Signal::buy(1.0, 0.31).is_buy_above(0.3));
        assert!(!Signal::buy(1.0, 0.3).is_buy_above(0.3));
        assert!(!Signal::sell(1.0, 0.9).is_buy_above(0.3));
    }

    #[test]
    fn test_signal_validation() {
        let mut signal = Signal::buy(1.0, 0.5);
        assert!(signal.validate().is_ok());

        signal.confidence = 1.1;
        assert!(signal.validate().is_err());

        let mut hold = Signal::hold();
        hold.entry_price = Some(1.0);
        assert!(hold.validate().is_err());
    }
}
