//! Bounded per-symbol price series

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

/// Rolling close history keyed by symbol.
///
/// Each series keeps at most `capacity` values, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    capacity: usize,
    series: HashMap<String, VecDeque<f64>>,
}

impl PriceHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append one close, evicting the oldest once full.
    /// Non-finite or non-positive prices are ignored.
    pub fn record(&mut self, symbol: &str, price: f64) {
        if !price.is_finite() || price <= 0.0 {
            return;
        }
        let capacity = self.capacity;
        let series = self
            .series
            .entry(symbol.to_string())
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        if series.len() == capacity {
            series.pop_front();
        }
        series.push_back(price);
    }

    /// Replace a symbol's history with `prices` (chronological)
    pub fn seed<I: IntoIterator<Item = f64>>(&mut self, symbol: &str, prices: I) {
        self.series.remove(symbol);
        for price in prices {
            self.record(symbol, price);
        }
    }

    /// Contiguous copy of a symbol's history, oldest first
    pub fn series(&self, symbol: &str) -> Vec<f64> {
        self.series
            .get(symbol)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.series.get(symbol).map_or(0, VecDeque::len)
    }

    pub fn latest(&self, symbol: &str) -> Option<f64> {
        self.series.get(symbol).and_then(|s| s.back().copied())
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_series() {
        let mut history = PriceHistory::new(5);
        history.record("AAA", 1.0);
        history.record("AAA", 2.0);
        history.record("BBB", 9.0);

        assert_eq!(history.series("AAA"), vec![1.0, 2.0]);
        assert_eq!(history.series("BBB"), vec![9.0]);
        assert_eq!(history.latest("AAA"), Some(2.0));
        assert!(history.series("CCC").is_empty());
        assert_eq!(history.len("CCC"), 0);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = PriceHistory::new(3);
        for price in [1.0, 2.0, 3.0, 4.0, 5.0] {
            history.record("AAA", price);
        }
        assert_eq!(history.series("AAA"), vec![3.0, 4.0, 5.0]);
        assert_eq!(history.len("AAA"), 3);
    }

    #[test]
    fn test_rejects_bad_prices() {
        let mut history = PriceHistory::new(3);
        history.record("AAA", 0.0);
        history.record("AAA", -1.0);
        history.record("AAA", f64::NAN);
        history.record("AAA", f64::INFINITY);
        assert_eq!(history.len("AAA"), 0);
    }

    #[test]
    fn test_seed_replaces() {
        let mut history = PriceHistory::new(4);
        history.record("AAA", 100.0);
        history.seed("AAA", [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(history.series("AAA"), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_zero_capacity_is_bumped() {
        let mut history = PriceHistory::new(0);
        history.record("AAA", 1.0);
        history.record("AAA", 2.0);
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.series("AAA"), vec![2.0]);
    }
}
