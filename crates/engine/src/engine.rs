//! The engine singleton: tick loop, maintenance, and lifecycle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use model::{EngineStatus, HistoryEvent, HistoryEventKind, RiskLevel};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::manager::MarketManager;
use crate::services::EngineServices;

/// Cache key holding the last UTC day a daily reset ran.
const LAST_DAILY_RESET_KEY: &str = "engine:last_daily_reset";
/// Cache key the status report is published under.
const STATUS_KEY: &str = "engine:status";
/// How long a published status report stays fresh.
const STATUS_TTL: Duration = Duration::from_secs(120);

/// Status report published to the cache on every maintenance pass.
#[derive(Debug, Serialize)]
struct StatusReport {
    status: EngineStatus,
    tick_count: u64,
    error_count: u64,
    active_markets: usize,
    risk_level: RiskLevel,
    timestamp_ms: i64,
}

/// The autonomous market-making engine.
///
/// Runs one tick per interval: refresh settings, pass the global risk gate,
/// fan out over every market under a hard deadline, and every Nth tick run
/// maintenance (daily reset, pool sync, expired-order sweep, status publish).
pub struct MarketMakerEngine {
    config: EngineConfig,
    services: EngineServices,
    manager: Arc<MarketManager>,
    status: RwLock<EngineStatus>,
    tick_count: AtomicU64,
    tick_running: AtomicBool,
    breaker_observed: AtomicBool,
}

impl MarketMakerEngine {
    pub fn new(config: EngineConfig, services: EngineServices) -> Self {
        let manager = Arc::new(MarketManager::new(config.clone(), services.clone()));
        Self {
            config,
            services,
            manager,
            status: RwLock::new(EngineStatus::Stopped),
            tick_count: AtomicU64::new(0),
            tick_running: AtomicBool::new(false),
            breaker_observed: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> EngineStatus {
        *self.status.read()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::SeqCst)
    }

    pub fn markets(&self) -> &MarketManager {
        &self.manager
    }

    /// Load every active market and move to RUNNING.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        {
            let mut status = self.status.write();
            if *status != EngineStatus::Stopped {
                return Err(EngineError::InvalidState(format!(
                    "cannot initialize from {:?}",
                    *status
                )));
            }
            *status = EngineStatus::Starting;
        }

        match self.manager.load_active_markets().await {
            Ok(started) => {
                *self.status.write() = EngineStatus::Running;
                self.publish_status().await;
                info!(markets = started, "engine running");
                Ok(())
            }
            Err(load_error) => {
                *self.status.write() = EngineStatus::Error;
                Err(load_error)
            }
        }
    }

    /// Tick loop; returns after shutdown is signalled and teardown finishes.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            interval_ms = self.config.tick_interval_ms,
            "engine tick loop started"
        );

        loop {
            tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    if self.status() != EngineStatus::Running {
                        continue;
                    }
                    if self.tick_running.swap(true, Ordering::SeqCst) {
                        // Previous tick still in flight: count it and move on
                        self.tick_count.fetch_add(1, Ordering::SeqCst);
                        self.services.metrics.inc_ticks_skipped();
                        warn!("previous tick still running, skipped");
                        continue;
                    }
                    let engine = self.clone();
                    tokio::spawn(async move {
                        engine.tick().await;
                        engine.tick_running.store(false, Ordering::SeqCst);
                    });
                }
            }
        }
        self.shutdown().await;
    }

    /// One engine tick.
    pub async fn tick(&self) {
        let started = Instant::now();
        let tick_number = self.tick_count.fetch_add(1, Ordering::SeqCst) + 1;

        let settings = self.services.settings.current().await;
        let gate = self.services.risk.check_global(&settings);
        if gate.can_trade {
            let (cancel_tx, cancel_rx) = watch::channel(false);
            let processing = self.manager.process_all_markets(&cancel_rx);
            tokio::pin!(processing);

            let deadline = Duration::from_millis(self.config.processing_timeout_ms);
            if tokio::time::timeout(deadline, &mut processing).await.is_err() {
                // Stop admitting new markets; already-admitted ones drain.
                let _ = cancel_tx.send(true);
                let timeout_error = EngineError::Timeout {
                    timeout_ms: self.config.processing_timeout_ms,
                };
                warn!(tick = tick_number, error = %timeout_error, "tick processing overran its deadline");
                processing.await;
                self.manager.record_error();
                self.services.metrics.inc_tick_errors();
            }
        } else if let Some(reason) = &gate.reason {
            debug!(tick = tick_number, %reason, "market processing gated off");
        }

        // Audit the breaker once per trip, not once per tick.
        let tripped = self.services.risk.circuit_breaker_tripped();
        if tripped && !self.breaker_observed.swap(true, Ordering::SeqCst) {
            self.record_history(
                HistoryEventKind::CircuitBreakerTripped,
                "global circuit breaker tripped",
            )
            .await;
        } else if !tripped {
            self.breaker_observed.store(false, Ordering::SeqCst);
        }

        if tick_number % self.config.maintenance_every_ticks == 0 {
            self.run_maintenance().await;
        }

        self.services.metrics.inc_ticks_completed();
        if started.elapsed() > Duration::from_millis(self.config.tick_interval_ms) {
            self.services.metrics.inc_slow_ticks();
        }

        if self.config.emergency_stop_enabled
            && self.manager.error_count() > self.config.max_error_count
        {
            error!(
                errors = self.manager.error_count(),
                budget = self.config.max_error_count,
                "error budget exhausted"
            );
            self.emergency_stop().await;
        }
    }

    /// Periodic maintenance: daily reset, pool sync, order sweep, publish.
    async fn run_maintenance(&self) {
        debug!("maintenance pass");

        let today = common::utc_day_key(common::epoch_ms());
        match self.services.cache.get(LAST_DAILY_RESET_KEY).await {
            Ok(last) if last.as_deref() == Some(today.as_str()) => {}
            Ok(_) => self.daily_reset(&today).await,
            // Without the marker we cannot tell; resetting twice is worse
            // than resetting late.
            Err(cache_error) => debug!(%cache_error, "daily reset marker unavailable"),
        }

        self.services.pool_manager.sync_all().await;

        let now_ms = common::epoch_ms();
        let mut swept = 0;
        for instance in self.manager.instances() {
            swept += instance.cleanup_expired_orders(now_ms).await;
        }
        if swept > 0 {
            info!(swept, "expired orders swept");
        }

        self.publish_status().await;
    }

    /// UTC-midnight reset of daily counters across the whole engine.
    async fn daily_reset(&self, today: &str) {
        info!(day = today, "daily reset");
        self.services.risk.reset_daily();
        self.manager.reset_errors();
        for instance in self.manager.instances() {
            instance.daily_reset().await;
        }
        self.record_history(HistoryEventKind::DailyReset, &format!("day {}", today))
            .await;
        if let Err(cache_error) = self
            .services
            .cache
            .set(LAST_DAILY_RESET_KEY, today, None)
            .await
        {
            warn!(%cache_error, "daily reset marker write failed");
        }
    }

    /// Publish the status report to the cache (best effort).
    async fn publish_status(&self) {
        let settings = self.services.settings.current().await;
        let report = StatusReport {
            status: self.status(),
            tick_count: self.tick_count(),
            error_count: self.manager.error_count(),
            active_markets: self.manager.active_count(),
            risk_level: self.services.risk.risk_level(settings.max_daily_loss),
            timestamp_ms: common::epoch_ms(),
        };
        let payload = match serde_json::to_string(&report) {
            Ok(payload) => payload,
            Err(serialize_error) => {
                warn!(%serialize_error, "status report serialization failed");
                return;
            }
        };
        if let Err(cache_error) = self
            .services
            .cache
            .set(STATUS_KEY, &payload, Some(STATUS_TTL))
            .await
        {
            debug!(%cache_error, "status publish failed");
        }
    }

    /// Graceful shutdown: stop every market and flush pools.
    pub async fn shutdown(&self) {
        {
            let mut status = self.status.write();
            if matches!(*status, EngineStatus::Stopping | EngineStatus::Stopped) {
                return;
            }
            *status = EngineStatus::Stopping;
        }
        info!("engine stopping");

        for market_maker_id in self.manager.active_market_ids() {
            if let Err(stop_error) = self.manager.stop_market(market_maker_id).await {
                warn!(market_maker_id, %stop_error, "market stop failed");
            }
        }
        self.services.pool_manager.sync_all().await;

        *self.status.write() = EngineStatus::Stopped;
        self.publish_status().await;
        info!("engine stopped");
    }

    /// Force-stop everything immediately, bypassing graceful teardown.
    pub async fn emergency_stop(&self) {
        error!("emergency stop");
        *self.status.write() = EngineStatus::Stopped;
        self.manager.emergency_stop_all().await;
        self.record_history(HistoryEventKind::EmergencyStop, "engine emergency stop")
            .await;
        self.publish_status().await;
    }

    async fn record_history(&self, kind: HistoryEventKind, detail: &str) {
        let event = HistoryEvent {
            market_maker_id: None,
            kind,
            detail: detail.to_string(),
            timestamp_ms: common::epoch_ms(),
        };
        if let Err(history_error) = self.services.history.record(&event).await {
            debug!(%history_error, "history record failed");
        }
    }
}
