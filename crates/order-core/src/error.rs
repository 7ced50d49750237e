//! Order error types.

use store_core::StoreError;
use thiserror::Error;

/// Errors from order lifecycle operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order is not tracked by this manager.
    #[error("order {order_id} not found")]
    NotFound { order_id: u64 },

    /// Underlying store or order book failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
