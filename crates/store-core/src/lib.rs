//! External collaborator seams for the market-making engine.
//!
//! The persistent store, settings store, key-value cache, price feed, shared
//! order book, and copy-trade transactional store are out of scope for the
//! engine itself; this crate defines them as async traits and ships in-memory
//! implementations used by the simulator binary and the test suites.

mod book;
mod cache;
mod copy;
mod error;
pub mod memory;
mod persist;

pub use book::{ExchangeBook, PlaceOrderRequest};
pub use cache::{CachedPriceFeed, KvCache, PriceFeed, SettingsStore};
pub use copy::{CopyStore, CopyTxn};
pub use error::{StoreError, StoreResult};
pub use persist::{HistoryStore, MarketStore, OrderStore, PoolStore, TradeStore};
