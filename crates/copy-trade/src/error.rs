//! Copy-trading error types.

use rust_decimal::Decimal;
use store_core::StoreError;
use thiserror::Error;

/// Errors from follower replication.
///
/// Terminal errors are business-rule rejections: retrying them cannot
/// succeed, so the retry loop gives up immediately. Store errors are
/// transient and retried.
#[derive(Debug, Error)]
pub enum CopyError {
    /// Follower is paused, terminated, or unknown.
    #[error("follower {follower_id} is not active")]
    InactiveFollower { follower_id: u64 },

    /// No allocation exists for this follower and symbol.
    #[error("follower {follower_id} has no allocation for {symbol}")]
    NoAllocation { follower_id: u64, symbol: String },

    /// Wallet or allocation cannot cover any tradeable amount.
    #[error("follower {follower_id} has insufficient {currency}")]
    InsufficientBalance {
        follower_id: u64,
        currency: String,
    },

    /// Follower's daily budget is exhausted.
    #[error("follower {follower_id} reached the daily limit")]
    DailyLimitReached { follower_id: u64 },

    /// Computed copy order is too small to place.
    #[error("copy order of {cost} is below the minimum {minimum}")]
    BelowMinimumOrder { cost: Decimal, minimum: Decimal },

    /// Underlying store failed; the transaction was rolled back.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CopyError {
    /// Whether retrying is pointless.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}
