use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Thread-safe metrics collector for the market-making engine.
#[derive(Debug)]
pub struct EngineMetrics {
    // Counters
    ticks_completed: AtomicU64,
    ticks_skipped: AtomicU64,
    slow_ticks: AtomicU64,
    trades_executed: AtomicU64,
    orders_placed: AtomicU64,
    orders_cancelled: AtomicU64,
    tick_errors: AtomicU64,
    copy_trades_replicated: AtomicU64,
    copy_trades_failed: AtomicU64,

    // Timestamps
    inner: RwLock<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    start_time: Instant,
    last_tick_time: Option<Instant>,
    last_trade_time: Option<Instant>,
    last_error_time: Option<Instant>,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            ticks_completed: AtomicU64::new(0),
            ticks_skipped: AtomicU64::new(0),
            slow_ticks: AtomicU64::new(0),
            trades_executed: AtomicU64::new(0),
            orders_placed: AtomicU64::new(0),
            orders_cancelled: AtomicU64::new(0),
            tick_errors: AtomicU64::new(0),
            copy_trades_replicated: AtomicU64::new(0),
            copy_trades_failed: AtomicU64::new(0),
            inner: RwLock::new(MetricsInner {
                start_time: Instant::now(),
                last_tick_time: None,
                last_trade_time: None,
                last_error_time: None,
            }),
        }
    }

    // --- Increment methods ---

    pub fn inc_ticks_completed(&self) {
        self.ticks_completed.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_tick_time = Some(Instant::now());
    }

    pub fn inc_ticks_skipped(&self) {
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_slow_ticks(&self) {
        self.slow_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_trades_executed(&self) {
        self.trades_executed.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_trade_time = Some(Instant::now());
    }

    pub fn inc_orders_placed(&self) {
        self.orders_placed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_orders_cancelled(&self) {
        self.orders_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tick_errors(&self) {
        self.tick_errors.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    pub fn inc_copy_trades_replicated(&self) {
        self.copy_trades_replicated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_copy_trades_failed(&self) {
        self.copy_trades_failed.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    // --- Getter methods ---

    pub fn ticks_completed(&self) -> u64 {
        self.ticks_completed.load(Ordering::Relaxed)
    }

    pub fn ticks_skipped(&self) -> u64 {
        self.ticks_skipped.load(Ordering::Relaxed)
    }

    pub fn slow_ticks(&self) -> u64 {
        self.slow_ticks.load(Ordering::Relaxed)
    }

    pub fn trades_executed(&self) -> u64 {
        self.trades_executed.load(Ordering::Relaxed)
    }

    pub fn orders_placed(&self) -> u64 {
        self.orders_placed.load(Ordering::Relaxed)
    }

    pub fn orders_cancelled(&self) -> u64 {
        self.orders_cancelled.load(Ordering::Relaxed)
    }

    pub fn tick_errors(&self) -> u64 {
        self.tick_errors.load(Ordering::Relaxed)
    }

    pub fn copy_trades_replicated(&self) -> u64 {
        self.copy_trades_replicated.load(Ordering::Relaxed)
    }

    pub fn copy_trades_failed(&self) -> u64 {
        self.copy_trades_failed.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.inner.read().start_time.elapsed().as_secs_f64()
    }

    pub fn secs_since_last_tick(&self) -> Option<f64> {
        self.inner
            .read()
            .last_tick_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_trade(&self) -> Option<f64> {
        self.inner
            .read()
            .last_trade_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_error(&self) -> Option<f64> {
        self.inner
            .read()
            .last_error_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    /// Calculate trades per second since start.
    pub fn trades_per_second(&self) -> f64 {
        let uptime = self.uptime_secs();
        if uptime > 0.0 {
            self.trades_executed() as f64 / uptime
        } else {
            0.0
        }
    }

    /// Generate a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks_completed: self.ticks_completed(),
            ticks_skipped: self.ticks_skipped(),
            slow_ticks: self.slow_ticks(),
            trades_executed: self.trades_executed(),
            orders_placed: self.orders_placed(),
            orders_cancelled: self.orders_cancelled(),
            tick_errors: self.tick_errors(),
            copy_trades_replicated: self.copy_trades_replicated(),
            copy_trades_failed: self.copy_trades_failed(),
            uptime_secs: self.uptime_secs(),
            trades_per_second: self.trades_per_second(),
            secs_since_last_tick: self.secs_since_last_tick(),
            secs_since_last_error: self.secs_since_last_error(),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub ticks_completed: u64,
    pub ticks_skipped: u64,
    pub slow_ticks: u64,
    pub trades_executed: u64,
    pub orders_placed: u64,
    pub orders_cancelled: u64,
    pub tick_errors: u64,
    pub copy_trades_replicated: u64,
    pub copy_trades_failed: u64,
    pub uptime_secs: f64,
    pub trades_per_second: f64,
    pub secs_since_last_tick: Option<f64>,
    pub secs_since_last_error: Option<f64>,
}

/// Health status of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Engine is healthy and ticking.
    Healthy,
    /// Engine is degraded (e.g., ticks have stalled briefly).
    Degraded,
    /// Engine is unhealthy (no ticks for an extended period).
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

impl MetricsSnapshot {
    /// Threshold in seconds for considering the tick loop stalled (degraded).
    const STALE_THRESHOLD_SECS: f64 = 30.0;
    /// Threshold in seconds for considering the engine unhealthy.
    const UNHEALTHY_THRESHOLD_SECS: f64 = 60.0;

    /// Determine the health status based on metrics.
    pub fn health_status(&self) -> HealthStatus {
        // If no tick has completed yet, judge by uptime
        let secs_since_tick = match self.secs_since_last_tick {
            Some(secs) => secs,
            None => {
                if self.uptime_secs < Self::STALE_THRESHOLD_SECS {
                    return HealthStatus::Healthy;
                } else if self.uptime_secs < Self::UNHEALTHY_THRESHOLD_SECS {
                    return HealthStatus::Degraded;
                } else {
                    return HealthStatus::Unhealthy;
                }
            }
        };

        if secs_since_tick > Self::UNHEALTHY_THRESHOLD_SECS {
            HealthStatus::Unhealthy
        } else if secs_since_tick > Self::STALE_THRESHOLD_SECS {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Engine Metrics ===")?;
        writeln!(f, "Uptime:               {:.1}s", self.uptime_secs)?;
        writeln!(f, "Ticks completed:      {}", self.ticks_completed)?;
        writeln!(f, "Ticks skipped:        {}", self.ticks_skipped)?;
        writeln!(f, "Slow ticks:           {}", self.slow_ticks)?;
        writeln!(f, "Trades executed:      {}", self.trades_executed)?;
        writeln!(f, "Trades/sec:           {:.2}", self.trades_per_second)?;
        writeln!(f, "Orders placed:        {}", self.orders_placed)?;
        writeln!(f, "Orders cancelled:     {}", self.orders_cancelled)?;
        writeln!(f, "Tick errors:          {}", self.tick_errors)?;
        writeln!(f, "Copies replicated:    {}", self.copy_trades_replicated)?;
        writeln!(f, "Copies failed:        {}", self.copy_trades_failed)?;
        if let Some(secs) = self.secs_since_last_tick {
            writeln!(f, "Since last tick:      {:.1}s", secs)?;
        }
        if let Some(secs) = self.secs_since_last_error {
            writeln!(f, "Since last error:     {:.1}s", secs)?;
        }
        Ok(())
    }
}

/// Shared handle to metrics.
pub type SharedMetrics = Arc<EngineMetrics>;

pub fn create_metrics() -> SharedMetrics {
    Arc::new(EngineMetrics::new())
}
