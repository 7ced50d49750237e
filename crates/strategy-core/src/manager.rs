//! Strategy registry, auto-selection, and decision combination.

use std::sync::Arc;

use dashmap::DashMap;
use model::Side;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::decision::{Decision, StrategyInput};
use crate::strategy::StrategyKind;

/// Deviation past which a market counts as "far from target".
const FAR_FROM_TARGET: Decimal = dec!(0.02);

/// Holds each market's active strategies and the oscillation phase anchors.
pub struct StrategyManager {
    active: DashMap<u64, Vec<StrategyKind>>,
    /// Phase anchor epoch-ms, keyed by (market, target) so a target change
    /// restarts the wave.
    phase_anchors: DashMap<String, i64>,
}

impl Default for StrategyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyManager {
    pub fn new() -> Self {
        Self {
            active: DashMap::new(),
            phase_anchors: DashMap::new(),
        }
    }

    pub fn set_strategies(&self, market_maker_id: u64, kinds: Vec<StrategyKind>) {
        self.active.insert(market_maker_id, kinds);
    }

    pub fn strategies_for(&self, market_maker_id: u64) -> Vec<StrategyKind> {
        self.active
            .get(&market_maker_id)
            .map(|k| k.clone())
            .unwrap_or_default()
    }

    /// Rule-table selection: high volatility gets oscillation, a large
    /// deviation gets gradual drift, otherwise level defense. Moderate
    /// volatility layers oscillation on top so price action stays organic.
    pub fn auto_select(&self, market_maker_id: u64, input: &StrategyInput) -> Vec<StrategyKind> {
        let mut kinds = if input.volatility > input.volatility_threshold {
            vec![StrategyKind::Oscillation]
        } else if input.deviation().abs() > FAR_FROM_TARGET {
            vec![StrategyKind::GradualDrift]
        } else {
            vec![StrategyKind::SupportResistance]
        };

        if input.volatility * dec!(2) > input.volatility_threshold
            && !kinds.contains(&StrategyKind::Oscillation)
        {
            kinds.push(StrategyKind::Oscillation);
        }

        debug!(
            market_maker_id,
            strategies = ?kinds.iter().map(|k| k.name()).collect::<Vec<_>>(),
            "auto-selected strategies"
        );
        self.set_strategies(market_maker_id, kinds.clone());
        kinds
    }

    /// Run every active strategy and combine their votes.
    ///
    /// Returns `None` when no strategy is active or none wants to trade.
    pub fn calculate(&self, market_maker_id: u64, mut input: StrategyInput) -> Option<Decision> {
        input.phase_elapsed_ms = self.phase_elapsed_ms(market_maker_id, input.target_price);

        let decisions: Vec<Decision> = self
            .strategies_for(market_maker_id)
            .iter()
            .map(|kind| kind.decide(&input))
            .filter(|d| d.should_trade)
            .collect();

        combine(&decisions)
    }

    fn phase_elapsed_ms(&self, market_maker_id: u64, target_price: Decimal) -> i64 {
        let key = format!("{}|{}", market_maker_id, target_price);
        let now = common::epoch_ms();
        let anchor = *self.phase_anchors.entry(key).or_insert(now);
        now - anchor
    }
}

/// Confidence-weighted combination of concurrent strategy votes.
///
/// Price adjustment and size multiplier are averaged by confidence; the
/// direction is a weighted vote with ties resolved to BUY.
pub fn combine(decisions: &[Decision]) -> Option<Decision> {
    if decisions.is_empty() {
        return None;
    }

    let total: Decimal = decisions.iter().map(|d| d.confidence).sum();
    // Zero-confidence votes still count equally rather than dividing by zero.
    let weight_of = |d: &Decision| {
        if total.is_zero() {
            Decimal::ONE
        } else {
            d.confidence
        }
    };
    let total_weight: Decimal = decisions.iter().map(weight_of).sum();

    let mut buy_weight = Decimal::ZERO;
    let mut sell_weight = Decimal::ZERO;
    let mut price_adjustment = Decimal::ZERO;
    let mut size_multiplier = Decimal::ZERO;
    for decision in decisions {
        let weight = weight_of(decision);
        match decision.direction {
            Side::Buy => buy_weight += weight,
            Side::Sell => sell_weight += weight,
        }
        price_adjustment += decision.price_adjustment * weight;
        size_multiplier += decision.size_multiplier * weight;
    }

    let direction = if buy_weight >= sell_weight {
        Side::Buy
    } else {
        Side::Sell
    };
    let confidence = total / Decimal::from(decisions.len());
    let reason = decisions
        .iter()
        .map(|d| d.reason.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    Some(Decision {
        should_trade: true,
        direction,
        price_adjustment: price_adjustment / total_weight,
        size_multiplier: size_multiplier / total_weight,
        confidence,
        reason,
    })
}

/// Shared handle to the strategy manager.
pub type SharedStrategyManager = Arc<StrategyManager>;

pub fn create_strategy_manager() -> SharedStrategyManager {
    Arc::new(StrategyManager::new())
}
