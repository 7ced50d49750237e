//! In-memory store implementations for the simulator binary and tests.

mod book;
mod cache;
mod copy;
mod store;

pub use book::MemoryExchangeBook;
pub use cache::{MemoryKvCache, MemoryPriceFeed, MemorySettings};
pub use copy::MemoryCopyStore;
pub use store::MemoryStore;
