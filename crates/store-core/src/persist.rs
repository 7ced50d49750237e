//! Persistent store traits for market, pool, order, trade, and history rows.

use async_trait::async_trait;
use model::{HistoryEvent, Market, MarketStatus, OrderRecord, PoolBalances, TradeRecord};
use rust_decimal::Decimal;

use crate::error::StoreResult;

/// Market-maker rows.
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// All markets currently marked ACTIVE.
    async fn list_active_markets(&self) -> StoreResult<Vec<Market>>;

    async fn get_market(&self, market_maker_id: u64) -> StoreResult<Option<Market>>;

    async fn update_market_status(
        &self,
        market_maker_id: u64,
        status: MarketStatus,
    ) -> StoreResult<()>;

    /// Bulk status flip used by emergency stop; one round trip for all markets.
    async fn bulk_update_status(
        &self,
        market_maker_ids: &[u64],
        status: MarketStatus,
    ) -> StoreResult<()>;

    async fn update_daily_volume(&self, market_maker_id: u64, volume: Decimal) -> StoreResult<()>;
}

/// Pool balance rows, one per market maker.
#[async_trait]
pub trait PoolStore: Send + Sync {
    async fn get_pool(&self, market_maker_id: u64) -> StoreResult<Option<PoolBalances>>;

    async fn update_pool(&self, market_maker_id: u64, pool: &PoolBalances) -> StoreResult<()>;
}

/// Settled trades. Inserted before in-memory balances are mutated so a crash
/// never loses a balance-affecting event.
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn insert_trade(&self, trade: &TradeRecord) -> StoreResult<()>;

    /// Trades for one market since the given timestamp, newest last.
    async fn recent_trades(
        &self,
        market_maker_id: u64,
        since_ms: i64,
    ) -> StoreResult<Vec<TradeRecord>>;
}

/// AI-order rows backing the in-memory open-order maps.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &OrderRecord) -> StoreResult<()>;

    async fn cancel_order(&self, order_id: u64) -> StoreResult<()>;

    async fn update_fill(&self, order_id: u64, filled_amount: Decimal) -> StoreResult<()>;
}

/// Audit/history events. Fire-and-forget; failures must not affect trading.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn record(&self, event: &HistoryEvent) -> StoreResult<()>;
}
