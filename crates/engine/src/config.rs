//! Engine configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Configuration for the market-maker engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between ticks in milliseconds.
    pub tick_interval_ms: u64,

    /// Hard cap on concurrently running markets.
    pub max_concurrent_markets: usize,

    /// Whether real-liquidity orders may be placed into the ecosystem book.
    pub enable_real_liquidity: bool,

    /// Whether the error budget may trigger an automatic emergency stop.
    pub emergency_stop_enabled: bool,

    /// Hard timeout for one tick's market processing, in milliseconds.
    pub processing_timeout_ms: u64,

    /// Periodic maintenance runs every this many ticks.
    pub maintenance_every_ticks: u64,

    /// Tick errors tolerated before the emergency stop fires.
    pub max_error_count: u64,

    /// Markets processed concurrently within one tick.
    pub market_batch_size: usize,

    /// Pacing delay between admission batches, in milliseconds.
    pub batch_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            max_concurrent_markets: 10,
            enable_real_liquidity: true,
            emergency_stop_enabled: true,
            processing_timeout_ms: 5_000,
            maintenance_every_ticks: 60,
            max_error_count: 100,
            market_batch_size: 5,
            batch_delay_ms: 50,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the tick interval.
    pub fn with_tick_interval_ms(mut self, interval_ms: u64) -> Self {
        self.tick_interval_ms = interval_ms;
        self
    }

    /// Builder method to set the concurrent-market cap.
    pub fn with_max_concurrent_markets(mut self, max: usize) -> Self {
        self.max_concurrent_markets = max;
        self
    }

    /// Builder method to enable/disable real-liquidity orders.
    pub fn with_real_liquidity(mut self, enabled: bool) -> Self {
        self.enable_real_liquidity = enabled;
        self
    }

    /// Builder method to enable/disable the automatic emergency stop.
    pub fn with_emergency_stop(mut self, enabled: bool) -> Self {
        self.emergency_stop_enabled = enabled;
        self
    }

    /// Builder method to set the per-tick processing timeout.
    pub fn with_processing_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.processing_timeout_ms = timeout_ms;
        self
    }
}

/// Configuration for per-market risk assessment.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Volatility above this multiple of a market's threshold rejects trades.
    pub volatility_reject_multiple: Decimal,

    /// Smallest fraction of the requested size the volatility shrink may
    /// produce.
    pub min_size_fraction: Decimal,

    /// A market losing more than this fraction of its pool stops trading.
    pub max_market_loss_fraction: Decimal,

    /// Consecutive losing trades on one market that trip the global breaker.
    pub max_consecutive_losses: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            volatility_reject_multiple: dec!(2),
            min_size_fraction: dec!(0.5),
            max_market_loss_fraction: dec!(0.05),
            max_consecutive_losses: 5,
        }
    }
}

impl RiskConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the consecutive-loss trip count.
    pub fn with_max_consecutive_losses(mut self, count: u32) -> Self {
        self.max_consecutive_losses = count;
        self
    }

    /// Builder method to set the market loss cutoff.
    pub fn with_max_market_loss_fraction(mut self, fraction: Decimal) -> Self {
        self.max_market_loss_fraction = fraction;
        self
    }
}
