//! Pool error types.

use rust_decimal::Decimal;
use store_core::StoreError;
use thiserror::Error;

/// Errors from pool and balance operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No pool exists for the market.
    #[error("pool for market {market_maker_id} not found")]
    NotFound { market_maker_id: u64 },

    /// Requested more than the available (unreserved) balance.
    #[error("insufficient {currency}: requested {requested}, available {available}")]
    InsufficientBalance {
        currency: String,
        requested: Decimal,
        available: Decimal,
    },

    /// Underlying store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
