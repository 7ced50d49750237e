//! Pool balances, reservations, and P&L.
//!
//! One `BalanceTracker` per market is the live source of truth between store
//! syncs; `PoolManager` owns the trackers and the write-through settlement
//! path; `PnLCalculator` attributes value changes to price moves vs trading.

mod balance;
mod error;
mod manager;
mod pnl;

pub use balance::BalanceTracker;
pub use error::PoolError;
pub use manager::{create_pool_manager, PoolManager, SharedPoolManager};
pub use pnl::PnLCalculator;
