//! Market lifecycle and bounded per-tick fan-out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use model::{HistoryEvent, HistoryEventKind, Market, MarketStatus};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::market::MarketInstance;
use crate::services::EngineServices;

/// Owns every running `MarketInstance` and drives them each tick.
///
/// Fan-out is bounded by a semaphore sized to the batch width, with a pacing
/// delay between admission waves so a large market count does not slam the
/// stores all at once. A per-market guard keeps one in-flight tick per
/// market even when a previous tick's work is still draining.
pub struct MarketManager {
    config: EngineConfig,
    services: EngineServices,
    markets: DashMap<u64, Arc<MarketInstance>>,
    processing: Arc<DashSet<u64>>,
    errors: Arc<AtomicU64>,
}

impl MarketManager {
    pub fn new(config: EngineConfig, services: EngineServices) -> Self {
        Self {
            config,
            services,
            markets: DashMap::new(),
            processing: Arc::new(DashSet::new()),
            errors: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn active_count(&self) -> usize {
        self.markets.len()
    }

    pub fn active_market_ids(&self) -> Vec<u64> {
        self.markets.iter().map(|entry| *entry.key()).collect()
    }

    pub fn instances(&self) -> Vec<Arc<MarketInstance>> {
        self.markets.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn instance(&self, market_maker_id: u64) -> Option<Arc<MarketInstance>> {
        self.markets.get(&market_maker_id).map(|entry| entry.clone())
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    pub fn reset_errors(&self) {
        self.errors.store(0, Ordering::SeqCst);
    }

    /// Start every ACTIVE market from the store, isolating per-market
    /// failures. Returns how many started.
    pub async fn load_active_markets(&self) -> Result<usize, EngineError> {
        let markets = self.services.market_store.list_active_markets().await?;
        let total = markets.len();
        let mut started = 0;
        for market in markets {
            let market_maker_id = market.market_maker_id;
            match self.start_market(market).await {
                Ok(true) => started += 1,
                Ok(false) => {}
                Err(error) => {
                    warn!(market_maker_id, %error, "market failed to start")
                }
            }
        }
        info!(started, total, "active markets loaded");
        Ok(started)
    }

    /// Start one market.
    ///
    /// Idempotent: an already-running market returns true. Returns false
    /// (without error) when the concurrent-market limit is reached or the
    /// pool is below the minimum liquidity.
    pub async fn start_market(&self, market: Market) -> Result<bool, EngineError> {
        let market_maker_id = market.market_maker_id;
        if self.markets.contains_key(&market_maker_id) {
            return Ok(true);
        }

        let settings = self.services.settings.current().await;
        let limit = self
            .config
            .max_concurrent_markets
            .min(settings.max_concurrent_bots);
        if self.markets.len() >= limit {
            warn!(market_maker_id, limit, "concurrent market limit reached");
            return Ok(false);
        }

        let pool = self.services.pool_manager.load_pool(market_maker_id).await?;
        let price = self
            .services
            .price_feed
            .last_price(&market.symbol())
            .await
            .unwrap_or(market.target_price);
        if pool.balances().total_value(price) < settings.min_pool_liquidity {
            warn!(
                market_maker_id,
                min_liquidity = %settings.min_pool_liquidity,
                "pool below minimum liquidity"
            );
            self.services.pool_manager.unload_pool(market_maker_id);
            return Ok(false);
        }

        let instance = Arc::new(MarketInstance::new(
            market,
            pool,
            self.services.order_store.clone(),
            self.services.book.clone(),
            self.services.market_store.clone(),
            self.services.pool_manager.clone(),
            self.services.price_feed.clone(),
            self.services.strategies.clone(),
            self.services.risk.clone(),
            self.services.metrics.clone(),
            self.config.enable_real_liquidity,
        ));
        instance.initialize().await;
        self.markets.insert(market_maker_id, instance);
        self.record_history(
            Some(market_maker_id),
            HistoryEventKind::MarketStarted,
            "market started",
        )
        .await;
        info!(market_maker_id, "market started");
        Ok(true)
    }

    /// Gracefully stop and unload one market; false when it is not running.
    pub async fn stop_market(&self, market_maker_id: u64) -> Result<bool, EngineError> {
        let Some((_, instance)) = self.markets.remove(&market_maker_id) else {
            return Ok(false);
        };
        instance.stop().await?;
        self.services.pool_manager.unload_pool(market_maker_id);
        self.record_history(
            Some(market_maker_id),
            HistoryEventKind::MarketStopped,
            "market stopped",
        )
        .await;
        Ok(true)
    }

    pub async fn pause_market(&self, market_maker_id: u64) -> Result<bool, EngineError> {
        let Some(instance) = self.instance(market_maker_id) else {
            return Ok(false);
        };
        instance.pause().await?;
        self.record_history(
            Some(market_maker_id),
            HistoryEventKind::MarketPaused,
            "market paused",
        )
        .await;
        Ok(true)
    }

    pub async fn resume_market(&self, market_maker_id: u64) -> Result<bool, EngineError> {
        let Some(instance) = self.instance(market_maker_id) else {
            return Ok(false);
        };
        instance.resume().await?;
        self.record_history(
            Some(market_maker_id),
            HistoryEventKind::MarketResumed,
            "market resumed",
        )
        .await;
        Ok(true)
    }

    /// One tick over every running market.
    ///
    /// Admission stops when the cancellation flag flips; markets already
    /// admitted run to completion. Per-market failures are isolated and
    /// counted against the engine's error budget.
    pub async fn process_all_markets(&self, cancel_rx: &watch::Receiver<bool>) {
        let semaphore = Arc::new(Semaphore::new(self.config.market_batch_size));
        let ids = self.active_market_ids();
        let mut handles = Vec::with_capacity(ids.len());
        let mut admitted = 0usize;

        for market_maker_id in ids {
            if *cancel_rx.borrow() {
                debug!("tick cancelled, stopping market admission");
                break;
            }
            let Some(instance) = self.instance(market_maker_id) else {
                continue;
            };
            // One in-flight tick per market
            if !self.processing.insert(market_maker_id) {
                debug!(market_maker_id, "previous tick still running, skipped");
                continue;
            }
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                self.processing.remove(&market_maker_id);
                break;
            };

            let processing = self.processing.clone();
            let errors = self.errors.clone();
            let metrics = self.services.metrics.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                if let Err(error) = instance.process_tick().await {
                    warn!(market_maker_id, %error, "market tick failed");
                    errors.fetch_add(1, Ordering::SeqCst);
                    metrics.inc_tick_errors();
                }
                processing.remove(&market_maker_id);
            }));

            admitted += 1;
            if admitted % self.config.market_batch_size == 0 {
                tokio::time::sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            }
        }

        for handle in handles {
            if let Err(join_error) = handle.await {
                warn!(%join_error, "market task panicked");
                self.errors.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Force-stop everything: cancel orders, flip all statuses in one bulk
    /// write, and clear the running set.
    pub async fn emergency_stop_all(&self) {
        let instances = self.instances();
        let ids: Vec<u64> = instances.iter().map(|i| i.market_maker_id()).collect();
        error!(markets = ids.len(), "emergency stop of all markets");

        for instance in &instances {
            instance.force_stop().await;
        }
        if let Err(store_error) = self
            .services
            .market_store
            .bulk_update_status(&ids, MarketStatus::Stopped)
            .await
        {
            error!(%store_error, "bulk stop persistence failed");
        }

        self.markets.clear();
        self.processing.clear();
        for market_maker_id in &ids {
            self.services.pool_manager.unload_pool(*market_maker_id);
        }
        self.record_history(
            None,
            HistoryEventKind::EmergencyStop,
            &format!("{} markets force-stopped", ids.len()),
        )
        .await;
    }

    async fn record_history(
        &self,
        market_maker_id: Option<u64>,
        kind: HistoryEventKind,
        detail: &str,
    ) {
        let event = HistoryEvent {
            market_maker_id,
            kind,
            detail: detail.to_string(),
            timestamp_ms: common::epoch_ms(),
        };
        if let Err(error) = self.services.history.record(&event).await {
            debug!(%error, "history record failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskConfig;
    use crate::risk::create_risk_manager;
    use crate::settings::create_settings_cache;
    use model::PoolBalances;
    use pool_core::create_pool_manager;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use store_core::memory::{
        MemoryExchangeBook, MemoryKvCache, MemoryPriceFeed, MemorySettings, MemoryStore,
    };
    use store_core::{CachedPriceFeed, PriceFeed};
    use strategy_core::create_strategy_manager;

    struct Fixture {
        store: Arc<MemoryStore>,
        manager: MarketManager,
    }

    fn make_market(id: u64, target: Decimal) -> Market {
        Market {
            market_maker_id: id,
            bot_id: id + 100,
            base_currency: format!("COIN{}", id),
            quote_currency: "USDT".to_string(),
            target_price: target,
            status: MarketStatus::Active,
            real_liquidity_percent: dec!(0),
            current_daily_volume: dec!(0),
            volatility: dec!(2),
            volatility_threshold: dec!(10),
            price_range_min: dec!(50),
            price_range_max: dec!(200),
            aggressiveness: dec!(0.5),
            base_order_size: dec!(1),
        }
    }

    fn make_fixture(config: EngineConfig) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let feed = Arc::new(MemoryPriceFeed::new());
        for id in 1..=5 {
            feed.set_price(&format!("COIN{}/USDT", id), dec!(100));
        }
        let services = EngineServices {
            market_store: store.clone(),
            order_store: store.clone(),
            book: Arc::new(MemoryExchangeBook::new()),
            history: store.clone(),
            cache: Arc::new(MemoryKvCache::new()),
            pool_manager: create_pool_manager(store.clone(), store.clone()),
            price_feed: Arc::new(CachedPriceFeed::new(feed as Arc<dyn PriceFeed>)),
            settings: create_settings_cache(Arc::new(MemorySettings::new())),
            strategies: create_strategy_manager(),
            risk: create_risk_manager(RiskConfig::default()),
            metrics: metrics::create_metrics(),
        };
        Fixture {
            store,
            manager: MarketManager::new(config, services),
        }
    }

    fn seed(fixture: &Fixture, id: u64, quote: Decimal) -> Market {
        let market = make_market(id, dec!(110));
        fixture.store.seed_market(market.clone());
        fixture
            .store
            .seed_pool(id, PoolBalances::new(dec!(10), quote));
        market
    }

    #[tokio::test]
    async fn test_start_market_is_idempotent() {
        let fixture = make_fixture(EngineConfig::default());
        let market = seed(&fixture, 1, dec!(10000));

        assert!(fixture.manager.start_market(market.clone()).await.unwrap());
        assert!(fixture.manager.start_market(market).await.unwrap());
        assert_eq!(fixture.manager.active_count(), 1);
    }

    #[tokio::test]
    async fn test_start_market_respects_concurrency_limit() {
        let fixture = make_fixture(EngineConfig::new().with_max_concurrent_markets(1));
        let first = seed(&fixture, 1, dec!(10000));
        let second = seed(&fixture, 2, dec!(10000));

        assert!(fixture.manager.start_market(first).await.unwrap());
        assert!(!fixture.manager.start_market(second).await.unwrap());
        assert_eq!(fixture.manager.active_count(), 1);
    }

    #[tokio::test]
    async fn test_start_market_requires_minimum_liquidity() {
        let fixture = make_fixture(EngineConfig::default());
        // Pool worth 10 * 100 + 50 = 1050... keep it tiny instead
        let market = make_market(1, dec!(110));
        fixture.store.seed_market(market.clone());
        fixture
            .store
            .seed_pool(1, PoolBalances::new(dec!(0), dec!(50)));

        assert!(!fixture.manager.start_market(market).await.unwrap());
        assert_eq!(fixture.manager.active_count(), 0);
    }

    #[tokio::test]
    async fn test_load_active_markets_isolates_failures() {
        let fixture = make_fixture(EngineConfig::default());
        seed(&fixture, 1, dec!(10000));
        // Market 2 has no pool row, so it fails to start
        fixture.store.seed_market(make_market(2, dec!(110)));
        seed(&fixture, 3, dec!(10000));

        let started = fixture.manager.load_active_markets().await.unwrap();
        assert_eq!(started, 2);
        assert_eq!(fixture.manager.active_count(), 2);
    }

    #[tokio::test]
    async fn test_process_all_markets_places_orders() {
        let fixture = make_fixture(EngineConfig::default());
        for id in 1..=3 {
            seed(&fixture, id, dec!(100000));
        }
        fixture.manager.load_active_markets().await.unwrap();

        let (_tx, rx) = watch::channel(false);
        fixture.manager.process_all_markets(&rx).await;

        let placed: usize = fixture
            .manager
            .instances()
            .iter()
            .map(|i| i.orders().open_order_count())
            .sum();
        assert!(placed >= 3, "expected one order per market, got {}", placed);
        assert_eq!(fixture.manager.error_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_tick_admits_nothing() {
        let fixture = make_fixture(EngineConfig::default());
        seed(&fixture, 1, dec!(100000));
        fixture.manager.load_active_markets().await.unwrap();

        let (_tx, rx) = watch::channel(true);
        fixture.manager.process_all_markets(&rx).await;

        let instance = fixture.manager.instance(1).unwrap();
        assert_eq!(instance.orders().open_order_count(), 0);
    }

    #[tokio::test]
    async fn test_market_failure_counts_against_budget() {
        let fixture = make_fixture(EngineConfig::default());
        seed(&fixture, 1, dec!(100000));
        fixture.manager.load_active_markets().await.unwrap();

        // Orders fail to persist, so the tick surfaces an error
        fixture.store.set_failing(true);
        let (_tx, rx) = watch::channel(false);
        fixture.manager.process_all_markets(&rx).await;
        fixture.store.set_failing(false);

        assert_eq!(fixture.manager.error_count(), 1);
        // The reservation was unwound with the failed order
        let instance = fixture.manager.instance(1).unwrap();
        assert_eq!(instance.pool().balances().reserved_quote, dec!(0));
    }

    #[tokio::test]
    async fn test_stop_market_unloads() {
        let fixture = make_fixture(EngineConfig::default());
        let market = seed(&fixture, 1, dec!(10000));
        fixture.manager.start_market(market).await.unwrap();

        assert!(fixture.manager.stop_market(1).await.unwrap());
        assert!(!fixture.manager.stop_market(1).await.unwrap());
        assert_eq!(fixture.manager.active_count(), 0);
        assert_eq!(fixture.store.market_status(1), Some(MarketStatus::Stopped));
    }

    #[tokio::test]
    async fn test_emergency_stop_clears_everything() {
        let fixture = make_fixture(EngineConfig::default());
        for id in 1..=3 {
            seed(&fixture, id, dec!(100000));
        }
        fixture.manager.load_active_markets().await.unwrap();

        fixture.manager.emergency_stop_all().await;

        assert_eq!(fixture.manager.active_count(), 0);
        for id in 1..=3 {
            assert_eq!(
                fixture.store.market_status(id),
                Some(MarketStatus::Stopped)
            );
        }
        assert!(fixture
            .store
            .history_events()
            .iter()
            .any(|e| e.kind == HistoryEventKind::EmergencyStop));
    }
}
