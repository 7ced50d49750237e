//! The closed set of market-making strategies.

use model::Side;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::decision::{Decision, StrategyInput};

/// Deviation below which gradual drift considers the price on target.
const DRIFT_DEADBAND: Decimal = dec!(0.0005);
/// Step bounds as a fraction of current price, scaled by aggressiveness.
const DRIFT_MIN_STEP: Decimal = dec!(0.001);
const DRIFT_MAX_STEP: Decimal = dec!(0.005);

/// Full sine period of the oscillation wave.
const OSC_PERIOD_MS: i64 = 60_000;
const OSC_BASE_AMPLITUDE: Decimal = dec!(0.002);
/// Range positions past which oscillation only pushes back toward center.
const OSC_UPPER_BAND: Decimal = dec!(0.9);
const OSC_LOWER_BAND: Decimal = dec!(0.1);
/// Adjustments smaller than this are not worth an order.
const OSC_MIN_ADJUSTMENT: Decimal = dec!(0.0002);

/// Number of synthetic levels on each side of the target.
const LADDER_DEPTH: u32 = 3;
const LADDER_BASE_SPACING: Decimal = dec!(0.005);
const LADDER_AGGR_SPACING: Decimal = dec!(0.01);
/// Defense size boost when price sits on a level.
const LADDER_DEFENSE_SIZE: Decimal = dec!(1.5);

/// A market-making strategy.
///
/// The set is closed: every strategy the engine can run is a variant here,
/// and each `decide` is a pure function of its input plus bounded jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Move price toward the target in small randomized steps.
    GradualDrift,
    /// Sine-wave motion around the current level, phase keyed to wall clock.
    Oscillation,
    /// Defend synthetic support/resistance ladders around the target.
    SupportResistance,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::GradualDrift => "gradual_drift",
            StrategyKind::Oscillation => "oscillation",
            StrategyKind::SupportResistance => "support_resistance",
        }
    }

    pub fn decide(&self, input: &StrategyInput) -> Decision {
        match self {
            StrategyKind::GradualDrift => decide_gradual_drift(input),
            StrategyKind::Oscillation => decide_oscillation(input),
            StrategyKind::SupportResistance => decide_support_resistance(input),
        }
    }
}

fn decide_gradual_drift(input: &StrategyInput) -> Decision {
    let deviation = input.deviation();
    if deviation.abs() < DRIFT_DEADBAND {
        return Decision::hold("price at target");
    }

    let mut step = DRIFT_MIN_STEP + input.aggressiveness * (DRIFT_MAX_STEP - DRIFT_MIN_STEP);

    // High volatility shrinks the step instead of pausing the drift.
    if input.volatility > input.volatility_threshold && !input.volatility.is_zero() {
        step = step * input.volatility_threshold / input.volatility;
    }

    // 80-120% of the computed step, so the motion never looks robotic.
    let jitter = rand::thread_rng().gen_range(0.8..=1.2);
    step *= Decimal::from_f64_retain(jitter).unwrap_or(Decimal::ONE);

    // Never overshoot the target.
    let step = step.min(deviation.abs());

    let direction = if deviation > Decimal::ZERO {
        Side::Buy
    } else {
        Side::Sell
    };
    let price_adjustment = if deviation > Decimal::ZERO { step } else { -step };
    let confidence = (deviation.abs() * dec!(20)).clamp(dec!(0.3), dec!(0.9));

    Decision {
        should_trade: true,
        direction,
        price_adjustment,
        size_multiplier: Decimal::ONE,
        confidence,
        reason: "drifting toward target".to_string(),
    }
}

fn decide_oscillation(input: &StrategyInput) -> Decision {
    let amplitude = OSC_BASE_AMPLITUDE * (Decimal::ONE + input.aggressiveness);

    let phase =
        (input.phase_elapsed_ms as f64 / OSC_PERIOD_MS as f64) * std::f64::consts::TAU;
    let wave = Decimal::from_f64_retain(phase.sin()).unwrap_or(Decimal::ZERO);
    let mut adjustment = amplitude * wave;

    // Near a range boundary the wave only ever pushes back toward center.
    let position = input.range_position();
    if position >= OSC_UPPER_BAND {
        adjustment = -adjustment.abs();
    } else if position <= OSC_LOWER_BAND {
        adjustment = adjustment.abs();
    }

    if adjustment.abs() < OSC_MIN_ADJUSTMENT {
        return Decision::hold("oscillation at node");
    }

    let direction = if adjustment > Decimal::ZERO {
        Side::Buy
    } else {
        Side::Sell
    };
    let wave_strength = if amplitude.is_zero() {
        Decimal::ZERO
    } else {
        adjustment.abs() / amplitude
    };
    let confidence = dec!(0.4) + wave_strength * dec!(0.2);

    Decision {
        should_trade: true,
        direction,
        price_adjustment: adjustment,
        size_multiplier: Decimal::ONE,
        confidence,
        reason: "oscillating around target".to_string(),
    }
}

fn decide_support_resistance(input: &StrategyInput) -> Decision {
    if input.current_price.is_zero() || input.target_price.is_zero() {
        return Decision::hold("no price reference");
    }

    let spacing = LADDER_BASE_SPACING + input.aggressiveness * LADDER_AGGR_SPACING;

    // Nearest level in the symmetric ladder around the target.
    let mut nearest: Option<(Decimal, Decimal)> = None;
    for k in 1..=LADDER_DEPTH {
        let offset = spacing * Decimal::from(k);
        for level in [
            input.target_price * (Decimal::ONE - offset),
            input.target_price * (Decimal::ONE + offset),
        ] {
            let distance = ((input.current_price - level) / input.current_price).abs();
            if nearest.map_or(true, |(_, d)| distance < d) {
                nearest = Some((level, distance));
            }
        }
    }

    let proximity = spacing * dec!(0.25);
    if let Some((level, distance)) = nearest {
        if distance <= proximity {
            // Defend the level: buy into support, sell into resistance,
            // with extra size, nudging price back toward the target.
            let defending_support = level < input.target_price;
            let (direction, price_adjustment) = if defending_support {
                (Side::Buy, spacing * dec!(0.2))
            } else {
                (Side::Sell, -spacing * dec!(0.2))
            };
            return Decision {
                should_trade: true,
                direction,
                price_adjustment,
                size_multiplier: LADDER_DEFENSE_SIZE,
                confidence: dec!(0.7),
                reason: "defending nearest level".to_string(),
            };
        }
    }

    // Between levels, drift gently toward the target.
    let deviation = input.deviation();
    if deviation.abs() < DRIFT_DEADBAND {
        return Decision::hold("holding between levels");
    }
    let step = deviation.abs().min(dec!(0.002));
    let direction = if deviation > Decimal::ZERO {
        Side::Buy
    } else {
        Side::Sell
    };
    let price_adjustment = if deviation > Decimal::ZERO { step } else { -step };

    Decision {
        should_trade: true,
        direction,
        price_adjustment,
        size_multiplier: Decimal::ONE,
        confidence: dec!(0.5),
        reason: "drifting between levels".to_string(),
    }
}
