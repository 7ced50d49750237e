//! Human-like limit price generation.
//!
//! Raw strategy prices are too clean: always on-tick, never clustered around
//! round numbers the way real traders cluster. The generator rounds to a
//! magnitude-appropriate tick, adds a couple ticks of imprecision, sometimes
//! parks just in front of a psychological round level, and respects a nearby
//! support/resistance level when one is supplied.

use model::Side;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Probability of nudging the rounded price by a tick or two.
const IMPRECISION_PROB: f64 = 0.7;
/// Probability of snapping toward a psychological round level.
const PSYCHOLOGICAL_PROB: f64 = 0.3;
/// A "round" level is this many ticks.
const ROUND_BLOCK_TICKS: u32 = 10;
/// Distance within which a supplied support/resistance level takes over.
const LEVEL_RANGE_TICKS: u32 = 5;

#[derive(Debug, Default)]
pub struct PriceGenerator;

impl PriceGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Tick size scaled to price magnitude.
    pub fn tick_size(price: Decimal) -> Decimal {
        if price >= dec!(10000) {
            dec!(1)
        } else if price >= dec!(1000) {
            dec!(0.5)
        } else if price >= dec!(100) {
            dec!(0.1)
        } else if price >= dec!(10) {
            dec!(0.01)
        } else if price >= dec!(1) {
            dec!(0.001)
        } else {
            dec!(0.0001)
        }
    }

    /// Turn a raw strategy price into a plausible limit price.
    ///
    /// `nearest_level` is a known support/resistance level close to the raw
    /// price, when the caller has one; orders are placed just in front of it.
    pub fn generate(
        &self,
        side: Side,
        raw_price: Decimal,
        nearest_level: Option<Decimal>,
    ) -> Decimal {
        let tick = Self::tick_size(raw_price);
        let mut price = round_to_tick(raw_price, tick);
        let mut rng = rand::thread_rng();

        if rng.gen_bool(IMPRECISION_PROB) {
            let offset = Decimal::from(rng.gen_range(-2i32..=2));
            price += offset * tick;
        }

        if rng.gen_bool(PSYCHOLOGICAL_PROB) {
            price = park_near_round(price, side, tick);
        }

        if let Some(level) = nearest_level {
            price = respect_level(price, level, side, tick);
        }

        // A generated price below one tick is never placeable.
        price.max(tick)
    }
}

fn round_to_tick(price: Decimal, tick: Decimal) -> Decimal {
    (price / tick).round() * tick
}

/// Sit one tick in front of the nearest round level: buys just below it,
/// sells just above, where human limit orders cluster.
fn park_near_round(price: Decimal, side: Side, tick: Decimal) -> Decimal {
    let block = tick * Decimal::from(ROUND_BLOCK_TICKS);
    let round_level = round_to_tick(price, block);
    match side {
        Side::Buy => round_level - tick,
        Side::Sell => round_level + tick,
    }
}

/// Place just in front of a known support/resistance level when the price
/// lands within range of it; otherwise leave the price alone.
fn respect_level(price: Decimal, level: Decimal, side: Side, tick: Decimal) -> Decimal {
    let range = tick * Decimal::from(LEVEL_RANGE_TICKS);
    if (price - level).abs() > range {
        return price;
    }
    match side {
        Side::Buy => level + tick,
        Side::Sell => level - tick,
    }
}
