//! Engine error types.

use order_core::OrderError;
use pool_core::PoolError;
use rust_decimal::Decimal;
use store_core::StoreError;
use thiserror::Error;

/// Errors from engine and market processing.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Underlying store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Order lifecycle operation failed.
    #[error("order error: {0}")]
    Order(#[from] OrderError),

    /// Pool or balance operation failed.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    /// Market processing overran its deadline.
    #[error("tick processing timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Operation invalid in the engine's current lifecycle state.
    #[error("invalid engine state: {0}")]
    InvalidState(String),
}

/// Why the risk chain blocked a trade or the whole tick.
///
/// Variants are ordered the way checks run: the first failing check wins and
/// later ones are never evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskRejection {
    #[error("trading is disabled")]
    TradingDisabled,

    #[error("platform is in maintenance mode")]
    MaintenanceMode,

    #[error("trading is globally paused")]
    GlobalPause,

    #[error("circuit breaker is tripped")]
    CircuitBreakerTripped,

    #[error("daily loss {current} exceeds limit {limit}")]
    DailyLossLimitExceeded { current: Decimal, limit: Decimal },

    #[error("volatility {volatility} exceeds threshold {threshold}")]
    VolatilityTooHigh {
        volatility: Decimal,
        threshold: Decimal,
    },

    #[error("market daily loss {loss_pct}% of pool value")]
    MarketLossTooHigh { loss_pct: Decimal },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rejection_messages() {
        let rejection = RiskRejection::DailyLossLimitExceeded {
            current: dec!(1200),
            limit: dec!(1000),
        };
        assert_eq!(
            rejection.to_string(),
            "daily loss 1200 exceeds limit 1000"
        );
    }

    #[test]
    fn test_store_error_converts() {
        let error: EngineError = StoreError::Timeout.into();
        assert!(matches!(error, EngineError::Store(_)));
    }

    #[test]
    fn test_timeout_message_carries_deadline() {
        let error = EngineError::Timeout { timeout_ms: 5000 };
        assert_eq!(error.to_string(), "tick processing timed out after 5000ms");
    }
}
