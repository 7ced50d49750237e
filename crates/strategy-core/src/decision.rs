//! Strategy inputs and outputs.

use model::Side;
use rust_decimal::Decimal;

/// Per-market snapshot handed to every strategy on a tick.
///
/// All fields are read-only; strategies are pure functions over this input
/// (plus their own jitter), which keeps them trivially composable.
#[derive(Debug, Clone)]
pub struct StrategyInput {
    pub current_price: Decimal,
    pub target_price: Decimal,
    pub volatility: Decimal,
    pub volatility_threshold: Decimal,
    /// 0.0 (passive) to 1.0 (aggressive); scales step sizes and ladder spacing.
    pub aggressiveness: Decimal,
    pub price_range_min: Decimal,
    pub price_range_max: Decimal,
    /// Milliseconds since the oscillation phase anchor for this (market, target).
    pub phase_elapsed_ms: i64,
}

impl StrategyInput {
    /// Signed fractional deviation of target from current price.
    ///
    /// Positive means the price must rise to reach the target.
    pub fn deviation(&self) -> Decimal {
        if self.current_price.is_zero() {
            return Decimal::ZERO;
        }
        (self.target_price - self.current_price) / self.current_price
    }

    /// Position of the current price inside the configured range, 0.0 to 1.0.
    pub fn range_position(&self) -> Decimal {
        let span = self.price_range_max - self.price_range_min;
        if span <= Decimal::ZERO {
            return Decimal::new(5, 1);
        }
        let pos = (self.current_price - self.price_range_min) / span;
        pos.clamp(Decimal::ZERO, Decimal::ONE)
    }
}

/// A single strategy's trade recommendation.
#[derive(Debug, Clone)]
pub struct Decision {
    pub should_trade: bool,
    pub direction: Side,
    /// Signed fraction of the current price to move by (positive = up).
    pub price_adjustment: Decimal,
    /// Multiplier on the market's base order size.
    pub size_multiplier: Decimal,
    /// 0.0 to 1.0; used as the weight when combining strategies.
    pub confidence: Decimal,
    pub reason: String,
}

impl Decision {
    /// A no-trade decision with zero weight.
    pub fn hold(reason: impl Into<String>) -> Self {
        Self {
            should_trade: false,
            direction: Side::Buy,
            price_adjustment: Decimal::ZERO,
            size_multiplier: Decimal::ONE,
            confidence: Decimal::ZERO,
            reason: reason.into(),
        }
    }
}
