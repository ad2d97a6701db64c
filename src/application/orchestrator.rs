//! Cycle Orchestrator
//!
//! Drives one trading cycle at a time over the configured watchlist:
//! 1. fetch a market snapshot per symbol (failures drop the symbol for the cycle)
//! 2. profit-taking partial sells on open positions
//! 3. per symbol: token filter, risk gate, crossover signal
//! 4. buy on a signal strictly above the confidence threshold
//! 5. value the ledger at this cycle's prices
//!
//! Cycles never overlap. The ledger lock is held for a whole cycle and a stop
//! request only takes effect between cycles.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::Instant;

use crate::config::{Config, SymbolEntry};
use crate::domain::{
    BuyIntent, FilterRejection, Fill, GateDecision, LedgerError, MarketSnapshot, PositionLedger,
    ProfitTakingPolicy, Side, Signal, TokenFilter, Valuation,
};
use crate::ports::{Broker, MarketFeed, RiskOracle};
use crate::strategy::{PriceHistory, SignalEngine, SmaCrossover, StrategyConfig};

use super::risk_gate::RiskGate;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// A symbol the orchestrator trades
#[derive(Debug, Clone, PartialEq)]
pub struct WatchedSymbol {
    pub symbol: String,
    pub pair_address: String,
    /// Overrides the base token address reported by the feed
    pub token_address: Option<String>,
}

impl WatchedSymbol {
    pub fn new(symbol: impl Into<String>, pair_address: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            pair_address: pair_address.into(),
            token_address: None,
        }
    }

    pub fn with_token(mut self, token_address: impl Into<String>) -> Self {
        self.token_address = Some(token_address.into());
        self
    }

    /// Address used for the risk oracle and the broker
    fn resolve_token(&self, snapshot: &MarketSnapshot) -> String {
        self.token_address
            .iter()
            .chain(std::iter::once(&snapshot.base_token_address))
            .find(|a| !a.is_empty())
            .cloned()
            .unwrap_or_else(|| self.pair_address.clone())
    }
}

impl From<&SymbolEntry> for WatchedSymbol {
    fn from(entry: &SymbolEntry) -> Self {
        Self {
            symbol: entry.symbol.clone(),
            pair_address: entry.pair_address.clone(),
            token_address: entry.token_address.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub strategy: StrategyConfig,
    pub partial_sell_ratio: f64,
    pub cycle_interval: Duration,
    pub run_duration: Duration,
    /// Wait after a failed cycle instead of `cycle_interval`
    pub error_backoff: Duration,
    /// Ledger snapshot written after every cycle
    pub state_file: Option<PathBuf>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyConfig::default(),
            partial_sell_ratio: crate::domain::DEFAULT_PARTIAL_SELL_RATIO,
            cycle_interval: Duration::from_secs(300),
            run_duration: Duration::from_secs(24 * 3600),
            error_backoff: Duration::from_secs(60),
            state_file: None,
        }
    }
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            strategy: StrategyConfig::from(config),
            partial_sell_ratio: config.portfolio.partial_sell_ratio,
            cycle_interval: config.schedule.cycle_interval(),
            run_duration: config.schedule.run_duration(),
            error_backoff: config.schedule.error_backoff(),
            state_file: config.portfolio.state_path(),
        }
    }
}

/// Why a symbol produced no buy this cycle (holds are not listed)
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Filtered(FilterRejection),
    Risk(GateDecision),
    AlreadyHeld,
    InsufficientCash { cash: f64, required: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedOrder {
    pub symbol: String,
    pub side: Side,
    pub reason: String,
}

/// Everything that happened in one cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    /// Prices fetched this cycle, by symbol
    pub prices: HashMap<String, f64>,
    /// Symbols dropped because the feed failed
    pub feed_failures: Vec<String>,
    pub sells: Vec<Fill>,
    pub buys: Vec<Fill>,
    pub signals: Vec<(String, Signal)>,
    pub skipped: Vec<(String, SkipReason)>,
    pub failed_orders: Vec<FailedOrder>,
    pub valuation: Valuation,
    /// Set when the ledger snapshot could not be written; fills above are still booked
    pub persistence_error: Option<String>,
}

/// Status snapshot
#[derive(Debug, Clone)]
pub struct OrchestratorStatus {
    pub is_running: bool,
    pub cycles_completed: u64,
    pub cash: f64,
    pub realized_pnl: f64,
    pub open_positions: Vec<String>,
    pub last_portfolio_value: Option<f64>,
}

pub struct CycleOrchestrator {
    settings: OrchestratorSettings,
    watchlist: Vec<WatchedSymbol>,
    ledger: Arc<Mutex<PositionLedger>>,
    history: Arc<Mutex<PriceHistory>>,
    feed: Arc<dyn MarketFeed>,
    risk_gate: RiskGate,
    broker: Arc<dyn Broker>,
    engine: Arc<dyn SignalEngine>,
    profit_taking: ProfitTakingPolicy,
    filter: Option<TokenFilter>,
    cycles: AtomicU64,
    completed: AtomicU64,
    last_value: Arc<RwLock<Option<f64>>>,
    is_running: Arc<RwLock<bool>>,
    shutdown_requested: Arc<RwLock<bool>>,
    wake: Arc<Notify>,
}

impl CycleOrchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        watchlist: Vec<WatchedSymbol>,
        ledger: PositionLedger,
        feed: Arc<dyn MarketFeed>,
        risk_gate: RiskGate,
        broker: Arc<dyn Broker>,
    ) -> Self {
        let engine: Arc<dyn SignalEngine> = Arc::new(SmaCrossover::from(&settings.strategy));
        let history = PriceHistory::new(settings.strategy.history_capacity);
        let profit_taking = ProfitTakingPolicy::new(settings.partial_sell_ratio);

        Self {
            settings,
            watchlist,
            ledger: Arc::new(Mutex::new(ledger)),
            history: Arc::new(Mutex::new(history)),
            feed,
            risk_gate,
            broker,
            engine,
            profit_taking,
            filter: None,
            cycles: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            last_value: Arc::new(RwLock::new(None)),
            is_running: Arc::new(RwLock::new(false)),
            shutdown_requested: Arc::new(RwLock::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Build from a validated config, restoring the ledger snapshot if one exists
    pub fn from_config(
        config: &Config,
        feed: Arc<dyn MarketFeed>,
        oracle: Arc<dyn RiskOracle>,
        broker: Arc<dyn Broker>,
    ) -> Result<Self, OrchestratorError> {
        config
            .validate()
            .map_err(|e| OrchestratorError::ConfigError(e.to_string()))?;

        let settings = OrchestratorSettings::from(config);
        let restored = match settings.state_file.as_deref() {
            Some(path) => PositionLedger::load(path)?,
            None => None,
        };
        let ledger = match restored {
            Some(ledger) => {
                tracing::info!(
                    "Restored ledger: cash ${:.2}, {} open position(s)",
                    ledger.cash(),
                    ledger.open_positions().count()
                );
                ledger
            }
            None => PositionLedger::with_trigger_multiple(
                config.portfolio.initial_balance,
                config.portfolio.partial_sell_multiple,
            ),
        };

        let watchlist = config.symbols.iter().map(WatchedSymbol::from).collect();
        let risk_gate = RiskGate::new(oracle, config.risk.unknown_risk_policy);
        let orchestrator = Self::new(settings, watchlist, ledger, feed, risk_gate, broker);

        Ok(match &config.filters {
            Some(settings) => orchestrator.with_filter(TokenFilter::new(settings.clone())),
            None => orchestrator,
        })
    }

    pub fn with_engine(mut self, engine: Arc<dyn SignalEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_filter(mut self, filter: TokenFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_history(mut self, history: PriceHistory) -> Self {
        self.history = Arc::new(Mutex::new(history));
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn watchlist(&self) -> &[WatchedSymbol] {
        &self.watchlist
    }

    /// Replace a symbol's close history (warm start)
    pub async fn seed_history(&self, symbol: &str, prices: &[f64]) {
        self.history.lock().await.seed(symbol, prices.iter().copied());
    }

    /// Clone of the current ledger
    pub async fn ledger_snapshot(&self) -> PositionLedger {
        self.ledger.lock().await.clone()
    }

    /// Execute one trading cycle
    pub async fn run_cycle(&self) -> Result<CycleReport, OrchestratorError> {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let started_at = Utc::now();
        let mut ledger = self.ledger.lock().await;

        // 1. Market data
        let mut snapshots: HashMap<String, MarketSnapshot> = HashMap::new();
        let mut prices = HashMap::new();
        let mut feed_failures = Vec::new();
        for entry in &self.watchlist {
            match self.feed.fetch(&entry.pair_address).await {
                Ok(snapshot) if snapshot.price_usd.is_finite() && snapshot.price_usd > 0.0 => {
                    prices.insert(entry.symbol.clone(), snapshot.price_usd);
                    snapshots.insert(entry.symbol.clone(), snapshot);
                }
                Ok(snapshot) => {
                    tracing::warn!(
                        "Discarding non-positive price {} for {}",
                        snapshot.price_usd,
                        entry.symbol
                    );
                    feed_failures.push(entry.symbol.clone());
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch {} from {}: {}", entry.symbol, self.feed.name(), e);
                    feed_failures.push(entry.symbol.clone());
                }
            }
        }
        {
            let mut history = self.history.lock().await;
            for (symbol, price) in &prices {
                history.record(symbol, *price);
            }
        }

        // 2. Profit taking
        let mut sells = Vec::new();
        let mut failed_orders = Vec::new();
        for intent in self.profit_taking.scan(&mut ledger, &prices) {
            let token = match self.watched(&intent.symbol).zip(snapshots.get(&intent.symbol)) {
                Some((entry, snapshot)) => entry.resolve_token(snapshot),
                None => intent.symbol.clone(),
            };
            match self.broker.execute(Side::Sell, &token, intent.quantity).await {
                Ok(execution) => {
                    match ledger.apply_fill(&intent.symbol, intent.quantity, intent.price, Side::Sell) {
                        Ok(fill) => {
                            tracing::info!(
                                "Partial sell {}: {:.6} @ ${:.6} (tx {})",
                                fill.symbol,
                                fill.quantity,
                                fill.price,
                                execution.transaction_id.as_deref().unwrap_or("-")
                            );
                            sells.push(fill);
                        }
                        Err(e) => {
                            tracing::error!("Broker filled sell of {} but ledger rejected it: {}", intent.symbol, e);
                            failed_orders.push(FailedOrder {
                                symbol: intent.symbol.clone(),
                                side: Side::Sell,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Partial sell of {} failed: {}; trigger consumed without a fill",
                        intent.symbol,
                        e
                    );
                    failed_orders.push(FailedOrder {
                        symbol: intent.symbol.clone(),
                        side: Side::Sell,
                        reason: e.to_string(),
                    });
                }
            }
        }

        // 3 + 4. Gate, signal, buy
        let threshold = self.settings.strategy.buy_confidence_threshold;
        let trade_size = self.settings.strategy.trade_size;
        let mut signals = Vec::new();
        let mut skipped = Vec::new();
        let mut buys = Vec::new();

        for entry in &self.watchlist {
            let Some(snapshot) = snapshots.get(&entry.symbol) else {
                continue;
            };
            let price = snapshot.price_usd;

            if let Some(filter) = &self.filter {
                if let Err(rejection) = filter.check(snapshot) {
                    tracing::debug!("{} filtered: {}", entry.symbol, rejection);
                    skipped.push((entry.symbol.clone(), SkipReason::Filtered(rejection)));
                    continue;
                }
            }

            let token = entry.resolve_token(snapshot);
            let decision = self.risk_gate.evaluate(&token).await;
            if !decision.allows_trading() {
                skipped.push((entry.symbol.clone(), SkipReason::Risk(decision)));
                continue;
            }

            let series = self.history.lock().await.series(&entry.symbol);
            let signal = self.engine.generate_signal(&series, price);
            tracing::debug!(
                "{} ${:.6} | {} (confidence {:.2}, {} closes)",
                entry.symbol,
                price,
                signal.signal_type,
                signal.confidence,
                series.len()
            );
            signals.push((entry.symbol.clone(), signal.clone()));

            if !signal.is_buy_above(threshold) {
                continue;
            }
            if ledger.has_open_position(&entry.symbol) {
                tracing::debug!("Skipping buy for {}: position already open", entry.symbol);
                skipped.push((entry.symbol.clone(), SkipReason::AlreadyHeld));
                continue;
            }
            let intent = BuyIntent::new(&entry.symbol, token, trade_size, price, signal.confidence);
            // Compare against what the ledger will charge, not the nominal trade size
            let cost = intent.quantity * intent.price;
            if ledger.cash() < cost {
                tracing::warn!(
                    "Skipping buy for {}: cash ${:.2} below cost ${:.2}",
                    entry.symbol,
                    ledger.cash(),
                    cost
                );
                skipped.push((
                    entry.symbol.clone(),
                    SkipReason::InsufficientCash {
                        cash: ledger.cash(),
                        required: cost,
                    },
                ));
                continue;
            }

            match self.broker.execute(Side::Buy, &intent.token_address, intent.notional).await {
                Ok(execution) => {
                    match ledger.apply_fill(&intent.symbol, intent.quantity, intent.price, Side::Buy) {
                        Ok(fill) => {
                            tracing::info!(
                                "Bought {}: {:.6} @ ${:.6} for ${:.2} (confidence {:.2}, tx {})",
                                fill.symbol,
                                fill.quantity,
                                fill.price,
                                intent.notional,
                                intent.confidence,
                                execution.transaction_id.as_deref().unwrap_or("-")
                            );
                            buys.push(fill);
                        }
                        Err(e) => {
                            tracing::error!("Broker filled buy of {} but ledger rejected it: {}", intent.symbol, e);
                            failed_orders.push(FailedOrder {
                                symbol: intent.symbol.clone(),
                                side: Side::Buy,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Buy of {} failed: {}", intent.symbol, e);
                    failed_orders.push(FailedOrder {
                        symbol: intent.symbol.clone(),
                        side: Side::Buy,
                        reason: e.to_string(),
                    });
                }
            }
        }

        // 5. Valuation
        let valuation = ledger.valuation(&prices);
        tracing::info!(
            "Cycle {}: portfolio ${:.2} (cash ${:.2}, holdings ${:.2}, realized P&L ${:.2}) | {} priced, {} dropped, {} buy(s), {} sell(s)",
            cycle,
            valuation.total,
            valuation.cash,
            valuation.holdings_value,
            ledger.realized_pnl(),
            prices.len(),
            feed_failures.len(),
            buys.len(),
            sells.len()
        );
        *self.last_value.write().await = Some(valuation.total);

        let persistence_error = match &self.settings.state_file {
            Some(path) => match ledger.save(path) {
                Ok(()) => None,
                Err(e) => {
                    tracing::error!(
                        "Failed to save ledger to {}: {} (fills remain booked in memory)",
                        path.display(),
                        e
                    );
                    Some(e.to_string())
                }
            },
            None => None,
        };
        self.completed.fetch_add(1, Ordering::SeqCst);

        Ok(CycleReport {
            cycle,
            started_at,
            prices,
            feed_failures,
            sells,
            buys,
            signals,
            skipped,
            failed_orders,
            valuation,
            persistence_error,
        })
    }

    fn watched(&self, symbol: &str) -> Option<&WatchedSymbol> {
        self.watchlist.iter().find(|w| w.symbol == symbol)
    }

    /// Run cycles until the run duration elapses or a stop is requested
    pub async fn run(&self) -> Result<(), OrchestratorError> {
        *self.is_running.write().await = true;
        let deadline = Instant::now() + self.settings.run_duration;

        tracing::info!(
            "Starting cycle orchestrator - {} symbol(s), interval {:?}, duration {:?}",
            self.watchlist.len(),
            self.settings.cycle_interval,
            self.settings.run_duration
        );

        while !*self.shutdown_requested.read().await && Instant::now() < deadline {
            let pause = match self.run_cycle().await {
                Ok(report) if report.persistence_error.is_some() => self.settings.error_backoff,
                Ok(_) => self.settings.cycle_interval,
                Err(e) => {
                    tracing::error!("Cycle error: {}", e);
                    // Continue running despite errors
                    self.settings.error_backoff
                }
            };

            let pause = pause.min(deadline.saturating_duration_since(Instant::now()));
            if pause.is_zero() {
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = self.wake.notified() => {}
            }
        }

        *self.is_running.write().await = false;
        tracing::info!(
            "Cycle orchestrator stopped after {} cycle(s)",
            self.completed.load(Ordering::SeqCst)
        );
        Ok(())
    }

    /// Request a stop. The current cycle finishes; only the wait is cut short.
    pub async fn stop(&self) {
        *self.shutdown_requested.write().await = true;
        self.wake.notify_one();
        tracing::info!("Stop signal sent to orchestrator");
    }

    /// Check if orchestrator is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Get current status
    pub async fn status(&self) -> OrchestratorStatus {
        let ledger = self.ledger.lock().await;
        OrchestratorStatus {
            is_running: *self.is_running.read().await,
            cycles_completed: self.completed.load(Ordering::SeqCst),
            cash: ledger.cash(),
            realized_pnl: ledger.realized_pnl(),
            open_positions: ledger.open_positions().map(|p| p.symbol.clone()).collect(),
            last_portfolio_value: *self.last_value.read().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UnknownRiskPolicy;
    use crate::ports::mocks::{MockBroker, MockMarketFeed, MockRiskOracle};

    fn orchestrator(settings: OrchestratorSettings) -> CycleOrchestrator {
        CycleOrchestrator::new(
            settings,
            vec![WatchedSymbol::new("AAA", "PairAAA")],
            PositionLedger::new(1000.0),
            Arc::new(MockMarketFeed::new().with_price("PairAAA", 1.0)),
            RiskGate::new(Arc::new(MockRiskOracle::new()), UnknownRiskPolicy::FailClosed),
            Arc::new(MockBroker::new()),
        )
    }

    #[test]
    fn test_resolve_token() {
        let mut snapshot = MarketSnapshot::with_price("PairAAA", 1.0);
        snapshot.base_token_address = "TokAAA".to_string();

        let plain = WatchedSymbol::new("AAA", "PairAAA");
        assert_eq!(plain.resolve_token(&snapshot), "TokAAA");

        let pinned = plain.clone().with_token("Pinned");
        assert_eq!(pinned.resolve_token(&snapshot), "Pinned");

        snapshot.base_token_address.clear();
        assert_eq!(plain.resolve_token(&snapshot), "PairAAA");
    }

    #[tokio::test]
    async fn test_cycle_counts_and_status() {
        let orch = orchestrator(OrchestratorSettings::default());
        let report = orch.run_cycle().await.unwrap();
        assert_eq!(report.cycle, 1);
        assert_eq!(report.prices.get("AAA"), Some(&1.0));
        assert_eq!(report.valuation.total, 1000.0);

        let status = orch.status().await;
        assert_eq!(status.cycles_completed, 1);
        assert_eq!(status.cash, 1000.0);
        assert_eq!(status.last_portfolio_value, Some(1000.0));
        assert!(!status.is_running);
    }

    #[tokio::test]
    async fn test_run_stops_at_duration() {
        let settings = OrchestratorSettings {
            cycle_interval: Duration::from_millis(10),
            run_duration: Duration::from_millis(45),
            ..OrchestratorSettings::default()
        };
        let orch = orchestrator(settings);

        tokio::time::timeout(Duration::from_secs(5), orch.run())
            .await
            .expect("run should end when the duration elapses")
            .unwrap();

        let cycles = orch.status().await.cycles_completed;
        assert!(cycles >= 2, "expected several cycles, got {}", cycles);
        assert!(!orch.is_running().await);
    }

    #[tokio::test]
    async fn test_stop_interrupts_wait() {
        let settings = OrchestratorSettings {
            cycle_interval: Duration::from_secs(3600),
            ..OrchestratorSettings::default()
        };
        let orch = Arc::new(orchestrator(settings));

        let runner = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.run().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        orch.stop().await;

        tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .expect("stop should cut the wait short")
            .unwrap()
            .unwrap();
        assert_eq!(orch.status().await.cycles_completed, 1);
    }

    /// State path whose parent is a regular file, so every save fails
    fn unwritable_state(dir: &tempfile::TempDir) -> PathBuf {
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        blocker.join("ledger.json")
    }

    #[tokio::test]
    async fn test_save_failure_keeps_report() {
        let dir = tempfile::tempdir().unwrap();
        let settings = OrchestratorSettings {
            state_file: Some(unwritable_state(&dir)),
            ..OrchestratorSettings::default()
        };
        let orch = orchestrator(settings);

        let report = orch.run_cycle().await.unwrap();
        assert!(report.persistence_error.is_some());
        assert_eq!(report.valuation.total, 1000.0);
        assert_eq!(orch.status().await.cycles_completed, 1);
    }

    #[tokio::test]
    async fn test_save_failure_uses_error_backoff() {
        let dir = tempfile::tempdir().unwrap();
        let settings = OrchestratorSettings {
            cycle_interval: Duration::from_secs(3600),
            error_backoff: Duration::from_millis(10),
            run_duration: Duration::from_millis(200),
            state_file: Some(unwritable_state(&dir)),
            ..OrchestratorSettings::default()
        };
        let orch = orchestrator(settings);

        tokio::time::timeout(Duration::from_secs(5), orch.run())
            .await
            .expect("backoff should be used instead of the cycle interval")
            .unwrap();
        assert!(orch.status().await.cycles_completed >= 2);
    }

    #[tokio::test]
    async fn test_stop_before_run() {
        let orch = orchestrator(OrchestratorSettings::default());
        orch.stop().await;
        orch.run().await.unwrap();
        assert_eq!(orch.status().await.cycles_completed, 0);
    }
}
