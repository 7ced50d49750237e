//! Shared domain types for the market-making engine.
//!
//! This crate holds the records that cross crate boundaries: market
//! definitions, pool balances, order sides and statuses, copy-trading
//! followers and allocations, and history events. Everything money-valued
//! uses `rust_decimal::Decimal`.

mod copy;
mod market;
mod order;
mod pool;

pub use copy::{
    Allocation, CopyMode, CopyTrade, CopyTradeStatus, Follower, FollowerStatus, LeaderTrade,
};
pub use market::{
    EngineStatus, HistoryEvent, HistoryEventKind, Market, MarketStatus, RiskLevel, Side,
    TradeRecord,
};
pub use order::OrderRecord;
pub use pool::PoolBalances;
