//! Risk gating for the engine and individual trades.
//!
//! Two layers: `check_global` runs once per tick and can halt all market
//! processing; `assess_trade_risk` runs per trade intention and can shrink
//! or reject it. Checks run in a fixed order and the first failure wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use model::{Market, RiskLevel};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, error, warn};

use crate::config::RiskConfig;
use crate::error::RiskRejection;
use crate::settings::GlobalSettings;

/// Result of the global per-tick gate.
#[derive(Debug, Clone)]
pub struct RiskGate {
    pub can_trade: bool,
    pub reason: Option<RiskRejection>,
    pub risk_level: RiskLevel,
}

/// Result of assessing a single trade intention.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeAssessment {
    /// Trade may proceed, possibly with a shrunk size.
    Approved { amount: Decimal },
    Rejected(RiskRejection),
}

#[derive(Debug, Default, Clone)]
struct MarketRiskState {
    consecutive_losses: u32,
    daily_pnl: Decimal,
}

/// Tracks daily P&L and loss streaks and applies the rejection chain.
pub struct RiskManager {
    config: RiskConfig,
    markets: DashMap<u64, MarketRiskState>,
    global_daily_pnl: RwLock<Decimal>,
    /// Tripped by a loss streak on any single market; halts all markets.
    circuit_breaker: AtomicBool,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            markets: DashMap::new(),
            global_daily_pnl: RwLock::new(Decimal::ZERO),
            circuit_breaker: AtomicBool::new(false),
        }
    }

    /// Per-tick gate over all trading.
    ///
    /// Order: trading disabled, maintenance, global pause, circuit breaker,
    /// daily loss limit (only when the stop loss is enabled).
    pub fn check_global(&self, settings: &GlobalSettings) -> RiskGate {
        let reason = if !settings.trading_enabled {
            Some(RiskRejection::TradingDisabled)
        } else if settings.maintenance_mode {
            Some(RiskRejection::MaintenanceMode)
        } else if settings.global_pause {
            Some(RiskRejection::GlobalPause)
        } else if self.circuit_breaker.load(Ordering::SeqCst) {
            Some(RiskRejection::CircuitBreakerTripped)
        } else if settings.stop_loss_enabled {
            let pnl = *self.global_daily_pnl.read();
            let loss = -pnl;
            if loss >= settings.max_daily_loss {
                Some(RiskRejection::DailyLossLimitExceeded {
                    current: loss,
                    limit: settings.max_daily_loss,
                })
            } else {
                None
            }
        } else {
            None
        };

        RiskGate {
            can_trade: reason.is_none(),
            reason,
            risk_level: self.risk_level(settings.max_daily_loss),
        }
    }

    /// Assess a single trade intention against volatility and market losses.
    ///
    /// Volatility above the reject multiple kills the trade; between the
    /// threshold and the multiple the size shrinks linearly down to the
    /// minimum fraction. A market that has lost too much of its pool today
    /// stops trading regardless of volatility.
    pub fn assess_trade_risk(
        &self,
        market: &Market,
        amount: Decimal,
        pool_value: Decimal,
    ) -> TradeAssessment {
        if pool_value > Decimal::ZERO {
            let daily_pnl = self
                .markets
                .get(&market.market_maker_id)
                .map(|state| state.daily_pnl)
                .unwrap_or_default();
            let loss_fraction = -daily_pnl / pool_value;
            if loss_fraction > self.config.max_market_loss_fraction {
                return TradeAssessment::Rejected(RiskRejection::MarketLossTooHigh {
                    loss_pct: loss_fraction * dec!(100),
                });
            }
        }

        if market.volatility_threshold > Decimal::ZERO {
            let ratio = market.volatility / market.volatility_threshold;
            if ratio > self.config.volatility_reject_multiple {
                return TradeAssessment::Rejected(RiskRejection::VolatilityTooHigh {
                    volatility: market.volatility,
                    threshold: market.volatility_threshold,
                });
            }
            if ratio > Decimal::ONE {
                let scale = (Decimal::ONE - dec!(0.5) * (ratio - Decimal::ONE))
                    .max(self.config.min_size_fraction);
                debug!(
                    market_maker_id = market.market_maker_id,
                    %ratio,
                    %scale,
                    "volatility shrink applied"
                );
                return TradeAssessment::Approved {
                    amount: amount * scale,
                };
            }
        }

        TradeAssessment::Approved { amount }
    }

    /// Record a settled trade's P&L; returns true when this trade tripped
    /// the circuit breaker.
    pub fn report_trade_result(&self, market_maker_id: u64, pnl: Decimal) -> bool {
        *self.global_daily_pnl.write() += pnl;

        let mut state = self.markets.entry(market_maker_id).or_default();
        state.daily_pnl += pnl;
        if pnl < Decimal::ZERO {
            state.consecutive_losses += 1;
            if state.consecutive_losses >= self.config.max_consecutive_losses
                && !self.circuit_breaker.swap(true, Ordering::SeqCst)
            {
                error!(
                    market_maker_id,
                    losses = state.consecutive_losses,
                    "loss streak tripped the circuit breaker"
                );
                return true;
            }
            if state.consecutive_losses + 1 == self.config.max_consecutive_losses {
                warn!(
                    market_maker_id,
                    losses = state.consecutive_losses,
                    "market one loss away from tripping the circuit breaker"
                );
            }
        } else {
            state.consecutive_losses = 0;
        }
        false
    }

    pub fn circuit_breaker_tripped(&self) -> bool {
        self.circuit_breaker.load(Ordering::SeqCst)
    }

    /// Manual breaker reset (admin action).
    pub fn reset_circuit_breaker(&self) {
        self.circuit_breaker.store(false, Ordering::SeqCst);
    }

    pub fn global_daily_pnl(&self) -> Decimal {
        *self.global_daily_pnl.read()
    }

    pub fn market_daily_pnl(&self, market_maker_id: u64) -> Decimal {
        self.markets
            .get(&market_maker_id)
            .map(|state| state.daily_pnl)
            .unwrap_or_default()
    }

    /// Observability classification of the current risk posture.
    pub fn risk_level(&self, max_daily_loss: Decimal) -> RiskLevel {
        if self.circuit_breaker.load(Ordering::SeqCst) {
            return RiskLevel::Critical;
        }
        let loss = -*self.global_daily_pnl.read();
        let near_streak = self.markets.iter().any(|state| {
            state.consecutive_losses + 1 >= self.config.max_consecutive_losses
        });
        if near_streak || (max_daily_loss > Decimal::ZERO && loss > max_daily_loss * dec!(0.8)) {
            RiskLevel::High
        } else if max_daily_loss > Decimal::ZERO && loss > max_daily_loss * dec!(0.5) {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Daily maintenance reset: P&L counters, streaks, and the breaker.
    pub fn reset_daily(&self) {
        *self.global_daily_pnl.write() = Decimal::ZERO;
        self.markets.clear();
        self.circuit_breaker.store(false, Ordering::SeqCst);
    }
}

/// Shared handle to the risk manager.
pub type SharedRiskManager = Arc<RiskManager>;

pub fn create_risk_manager(config: RiskConfig) -> SharedRiskManager {
    Arc::new(RiskManager::new(config))
}
