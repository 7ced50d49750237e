//! In-memory persistent store.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use model::{HistoryEvent, Market, MarketStatus, OrderRecord, PoolBalances, TradeRecord};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::error::{StoreError, StoreResult};
use crate::persist::{HistoryStore, MarketStore, OrderStore, PoolStore, TradeStore};

/// All persistent rows behind one handle, for wiring the simulator and tests.
#[derive(Default)]
pub struct MemoryStore {
    markets: DashMap<u64, Market>,
    pools: DashMap<u64, PoolBalances>,
    trades: RwLock<Vec<TradeRecord>>,
    orders: DashMap<u64, OrderRecord>,
    history: RwLock<Vec<HistoryEvent>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a store outage; every call fails until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }

    // --- seeding / inspection helpers for tests and the simulator ---

    pub fn seed_market(&self, market: Market) {
        self.markets.insert(market.market_maker_id, market);
    }

    pub fn seed_pool(&self, market_maker_id: u64, pool: PoolBalances) {
        self.pools.insert(market_maker_id, pool);
    }

    pub fn trade_count(&self) -> usize {
        self.trades.read().len()
    }

    pub fn history_events(&self) -> Vec<HistoryEvent> {
        self.history.read().clone()
    }

    pub fn order(&self, order_id: u64) -> Option<OrderRecord> {
        self.orders.get(&order_id).map(|o| o.clone())
    }

    pub fn market_status(&self, market_maker_id: u64) -> Option<MarketStatus> {
        self.markets.get(&market_maker_id).map(|m| m.status)
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn list_active_markets(&self) -> StoreResult<Vec<Market>> {
        self.check_available()?;
        Ok(self
            .markets
            .iter()
            .filter(|m| m.status == MarketStatus::Active)
            .map(|m| m.clone())
            .collect())
    }

    async fn get_market(&self, market_maker_id: u64) -> StoreResult<Option<Market>> {
        self.check_available()?;
        Ok(self.markets.get(&market_maker_id).map(|m| m.clone()))
    }

    async fn update_market_status(
        &self,
        market_maker_id: u64,
        status: MarketStatus,
    ) -> StoreResult<()> {
        self.check_available()?;
        match self.markets.get_mut(&market_maker_id) {
            Some(mut market) => {
                market.status = status;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("market {}", market_maker_id))),
        }
    }

    async fn bulk_update_status(
        &self,
        market_maker_ids: &[u64],
        status: MarketStatus,
    ) -> StoreResult<()> {
        self.check_available()?;
        for id in market_maker_ids {
            if let Some(mut market) = self.markets.get_mut(id) {
                market.status = status;
            }
        }
        Ok(())
    }

    async fn update_daily_volume(&self, market_maker_id: u64, volume: Decimal) -> StoreResult<()> {
        self.check_available()?;
        match self.markets.get_mut(&market_maker_id) {
            Some(mut market) => {
                market.current_daily_volume = volume;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("market {}", market_maker_id))),
        }
    }
}

#[async_trait]
impl PoolStore for MemoryStore {
    async fn get_pool(&self, market_maker_id: u64) -> StoreResult<Option<PoolBalances>> {
        self.check_available()?;
        Ok(self.pools.get(&market_maker_id).map(|p| p.clone()))
    }

    async fn update_pool(&self, market_maker_id: u64, pool: &PoolBalances) -> StoreResult<()> {
        self.check_available()?;
        self.pools.insert(market_maker_id, pool.clone());
        Ok(())
    }
}

#[async_trait]
impl TradeStore for MemoryStore {
    async fn insert_trade(&self, trade: &TradeRecord) -> StoreResult<()> {
        self.check_available()?;
        self.trades.write().push(trade.clone());
        Ok(())
    }

    async fn recent_trades(
        &self,
        market_maker_id: u64,
        since_ms: i64,
    ) -> StoreResult<Vec<TradeRecord>> {
        self.check_available()?;
        Ok(self
            .trades
            .read()
            .iter()
            .filter(|t| t.market_maker_id == market_maker_id && t.executed_at_ms >= since_ms)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &OrderRecord) -> StoreResult<()> {
        self.check_available()?;
        self.orders.insert(order.order_id, order.clone());
        Ok(())
    }

    async fn cancel_order(&self, order_id: u64) -> StoreResult<()> {
        self.check_available()?;
        self.orders.remove(&order_id);
        Ok(())
    }

    async fn update_fill(&self, order_id: u64, filled_amount: Decimal) -> StoreResult<()> {
        self.check_available()?;
        match self.orders.get_mut(&order_id) {
            Some(mut order) => {
                order.filled_amount = filled_amount;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("order {}", order_id))),
        }
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn record(&self, event: &HistoryEvent) -> StoreResult<()> {
        self.check_available()?;
        self.history.write().push(event.clone());
        Ok(())
    }
}
