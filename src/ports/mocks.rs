//! In-memory port implementations that record calls and return scripted responses.
//!
//! Used by unit and integration tests to drive the trading cycle deterministically.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::{MarketSnapshot, RiskAssessment, Side};

use super::broker::{Broker, BrokerError, ExecutionReport};
use super::market_feed::{FeedError, MarketFeed};
use super::risk_oracle::{OracleError, RiskOracle};
use super::secret_store::{SecretError, SecretStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock market feed with per-pair snapshots and failures
#[derive(Debug, Default, Clone)]
pub struct MockMarketFeed {
    calls: Arc<Mutex<Vec<String>>>,
    snapshots: Arc<Mutex<HashMap<String, MarketSnapshot>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl MockMarketFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set a full snapshot for a pair
    pub fn with_snapshot(self, snapshot: MarketSnapshot) -> Self {
        lock(&self.snapshots).insert(snapshot.pair_address.clone(), snapshot);
        self
    }

    /// Builder method to set a price-only snapshot for a pair
    pub fn with_price(self, pair_address: &str, price: f64) -> Self {
        self.set_price(pair_address, price);
        self
    }

    /// Builder method to make fetches for a pair fail
    pub fn with_failure(self, pair_address: &str) -> Self {
        self.set_failing(pair_address, true);
        self
    }

    /// Update a pair's price in place, keeping any other snapshot fields
    pub fn set_price(&self, pair_address: &str, price: f64) {
        let mut snapshots = lock(&self.snapshots);
        snapshots
            .entry(pair_address.to_string())
            .and_modify(|s| s.price_usd = price)
            .or_insert_with(|| MarketSnapshot::with_price(pair_address, price));
    }

    pub fn set_failing(&self, pair_address: &str, failing: bool) {
        let mut set = lock(&self.failing);
        if failing {
            set.insert(pair_address.to_string());
        } else {
            set.remove(pair_address);
        }
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl MarketFeed for MockMarketFeed {
    async fn fetch(&self, pair_address: &str) -> Result<MarketSnapshot, FeedError> {
        lock(&self.calls).push(pair_address.to_string());
        if lock(&self.failing).contains(pair_address) {
            return Err(FeedError::Unavailable(format!("scripted failure for {}", pair_address)));
        }
        lock(&self.snapshots)
            .get(pair_address)
            .cloned()
            .ok_or_else(|| FeedError::PairNotFound(pair_address.to_string()))
    }

    fn name(&self) -> &str {
        "mock-feed"
    }
}

/// Mock risk oracle. Unscripted tokens score `default_score`.
#[derive(Debug, Clone)]
pub struct MockRiskOracle {
    calls: Arc<Mutex<Vec<String>>>,
    scores: Arc<Mutex<HashMap<String, f64>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    unavailable: bool,
    default_score: f64,
}

impl Default for MockRiskOracle {
    fn default() -> Self {
        Self {
            calls: Arc::default(),
            scores: Arc::default(),
            failing: Arc::default(),
            unavailable: false,
            default_score: 0.1,
        }
    }
}

impl MockRiskOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_score(self, token_address: &str, score: f64) -> Self {
        lock(&self.scores).insert(token_address.to_string(), score);
        self
    }

    pub fn with_failure(self, token_address: &str) -> Self {
        lock(&self.failing).insert(token_address.to_string());
        self
    }

    /// Every check fails
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn get_calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl RiskOracle for MockRiskOracle {
    async fn check(&self, token_address: &str) -> Result<RiskAssessment, OracleError> {
        lock(&self.calls).push(token_address.to_string());
        if self.unavailable || lock(&self.failing).contains(token_address) {
            return Err(OracleError::Unavailable("scripted outage".to_string()));
        }
        let score = lock(&self.scores)
            .get(token_address)
            .copied()
            .unwrap_or(self.default_score);
        Ok(RiskAssessment::from_score(token_address, score))
    }
}

/// A recorded broker submission
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerCall {
    pub side: Side,
    pub token_address: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Failure {
    /// `submit` returns `Err(Unavailable)`
    Outage,
    /// `submit` returns a report with `success == false`
    Rejection,
}

/// Mock broker that fills everything unless told otherwise
#[derive(Debug, Default, Clone)]
pub struct MockBroker {
    calls: Arc<Mutex<Vec<BrokerCall>>>,
    failures: Arc<Mutex<HashMap<(Side, String), Failure>>>,
    outage: bool,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// All submissions fail with `BrokerError::Unavailable`
    pub fn offline() -> Self {
        Self {
            outage: true,
            ..Self::default()
        }
    }

    /// Submissions of `side` for `token_address` return an unsuccessful report
    pub fn with_rejection(self, side: Side, token_address: &str) -> Self {
        self.set_failure(side, token_address, Some(Failure::Rejection));
        self
    }

    /// Submissions of `side` for `token_address` error out
    pub fn with_outage(self, side: Side, token_address: &str) -> Self {
        self.set_failure(side, token_address, Some(Failure::Outage));
        self
    }

    /// Clear any scripted failure for `side` / `token_address`
    pub fn recover(&self, side: Side, token_address: &str) {
        self.set_failure(side, token_address, None);
    }

    fn set_failure(&self, side: Side, token_address: &str, failure: Option<Failure>) {
        let key = (side, token_address.to_string());
        let mut failures = lock(&self.failures);
        match failure {
            Some(f) => {
                failures.insert(key, f);
            }
            None => {
                failures.remove(&key);
            }
        }
    }

    pub fn get_calls(&self) -> Vec<BrokerCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_for(&self, side: Side) -> Vec<BrokerCall> {
        self.get_calls().into_iter().filter(|c| c.side == side).collect()
    }
}

#[async_trait]
impl Broker for MockBroker {
    async fn submit(
        &self,
        side: Side,
        token_address: &str,
        amount: f64,
    ) -> Result<ExecutionReport, BrokerError> {
        let sequence = {
            let mut calls = lock(&self.calls);
            calls.push(BrokerCall {
                side,
                token_address: token_address.to_string(),
                amount,
            });
            calls.len()
        };

        if self.outage {
            return Err(BrokerError::Unavailable("broker offline".to_string()));
        }
        let failure = lock(&self.failures)
            .get(&(side, token_address.to_string()))
            .copied();
        match failure {
            Some(Failure::Outage) => Err(BrokerError::Unavailable("scripted outage".to_string())),
            Some(Failure::Rejection) => Ok(ExecutionReport::failed("scripted rejection")),
            None => Ok(ExecutionReport::filled(format!("mock_tx_{}", sequence))),
        }
    }
}

/// Unencrypted in-memory secret store
#[derive(Debug, Clone)]
pub struct MemorySecretStore {
    initialized: bool,
    values: HashMap<String, String>,
}

impl Default for MemorySecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self {
            initialized: true,
            values: HashMap::new(),
        }
    }

    pub fn uninitialized() -> Self {
        Self {
            initialized: false,
            values: HashMap::new(),
        }
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
        if !self.initialized {
            return Err(SecretError::StorageUninitialized);
        }
        Ok(self.values.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), SecretError> {
        if !self.initialized {
            return Err(SecretError::StorageUninitialized);
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
