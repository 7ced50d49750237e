//! Order lifecycle management.
//!
//! `OrderManager` owns one market's open orders: creation with
//! liquidity-dependent expirations, cancellation (unwinding the ecosystem
//! book for real orders), expired sweeps, greedy AI-to-AI matching, and fill
//! tracking.

mod error;
mod manager;
mod stats;

pub use error::OrderError;
pub use manager::OrderManager;
pub use stats::OrderStats;
