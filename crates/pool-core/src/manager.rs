//! Pool lifecycle and settlement orchestration.

use std::sync::Arc;

use dashmap::DashMap;
use model::TradeRecord;
use rust_decimal::Decimal;
use store_core::{PoolStore, TradeStore};
use tracing::{debug, warn};

use crate::balance::BalanceTracker;
use crate::error::PoolError;

/// Owns every loaded pool's balance tracker and mediates all store traffic.
///
/// Settlement is write-through: the trade row is persisted before the
/// in-memory balances change, so a crash never loses an applied fill.
pub struct PoolManager {
    pool_store: Arc<dyn PoolStore>,
    trade_store: Arc<dyn TradeStore>,
    trackers: DashMap<u64, Arc<BalanceTracker>>,
}

impl PoolManager {
    pub fn new(pool_store: Arc<dyn PoolStore>, trade_store: Arc<dyn TradeStore>) -> Self {
        Self {
            pool_store,
            trade_store,
            trackers: DashMap::new(),
        }
    }

    /// Load a pool's balances from the store into a live tracker.
    ///
    /// Idempotent; an already-loaded tracker is returned as-is.
    pub async fn load_pool(&self, market_maker_id: u64) -> Result<Arc<BalanceTracker>, PoolError> {
        if let Some(tracker) = self.trackers.get(&market_maker_id) {
            return Ok(tracker.clone());
        }
        let balances = self
            .pool_store
            .get_pool(market_maker_id)
            .await?
            .ok_or(PoolError::NotFound { market_maker_id })?;
        let tracker = Arc::new(BalanceTracker::new(market_maker_id, balances));
        self.trackers.insert(market_maker_id, tracker.clone());
        Ok(tracker)
    }

    pub fn tracker(&self, market_maker_id: u64) -> Option<Arc<BalanceTracker>> {
        self.trackers.get(&market_maker_id).map(|t| t.clone())
    }

    pub fn unload_pool(&self, market_maker_id: u64) {
        self.trackers.remove(&market_maker_id);
    }

    /// Persist the trade, then apply it to the live balances.
    ///
    /// A store failure leaves the in-memory balances untouched; the caller's
    /// reservation stays in place and can be retried or released.
    pub async fn settle_trade(&self, trade: &TradeRecord) -> Result<(), PoolError> {
        let tracker = self
            .tracker(trade.market_maker_id)
            .ok_or(PoolError::NotFound {
                market_maker_id: trade.market_maker_id,
            })?;

        self.trade_store.insert_trade(trade).await?;
        tracker.apply_trade(trade);

        // Pool persistence is eventual; a failure here is retried on the
        // next sync pass.
        if let Err(error) = self
            .pool_store
            .update_pool(trade.market_maker_id, &tracker.balances())
            .await
        {
            warn!(
                market_maker_id = trade.market_maker_id,
                %error,
                "pool sync after settlement failed"
            );
        } else {
            tracker.mark_synced();
        }
        Ok(())
    }

    /// Credit funds into a pool and persist the new balances.
    pub async fn deposit(
        &self,
        market_maker_id: u64,
        base_delta: Decimal,
        quote_delta: Decimal,
    ) -> Result<(), PoolError> {
        let tracker = self
            .tracker(market_maker_id)
            .ok_or(PoolError::NotFound { market_maker_id })?;

        let mut balances = tracker.balances();
        balances.base_currency_balance += base_delta;
        balances.quote_currency_balance += quote_delta;

        self.pool_store.update_pool(market_maker_id, &balances).await?;
        tracker.set_balances(balances);
        tracker.mark_synced();
        Ok(())
    }

    /// Withdraw funds; fails closed against available (unreserved) balance.
    pub async fn withdraw(
        &self,
        market_maker_id: u64,
        base_amount: Decimal,
        quote_amount: Decimal,
    ) -> Result<(), PoolError> {
        let tracker = self
            .tracker(market_maker_id)
            .ok_or(PoolError::NotFound { market_maker_id })?;

        let mut balances = tracker.balances();
        if balances.available_base() < base_amount {
            return Err(PoolError::InsufficientBalance {
                currency: "base".to_string(),
                requested: base_amount,
                available: balances.available_base(),
            });
        }
        if balances.available_quote() < quote_amount {
            return Err(PoolError::InsufficientBalance {
                currency: "quote".to_string(),
                requested: quote_amount,
                available: balances.available_quote(),
            });
        }
        balances.base_currency_balance -= base_amount;
        balances.quote_currency_balance -= quote_amount;

        self.pool_store.update_pool(market_maker_id, &balances).await?;
        tracker.set_balances(balances);
        tracker.mark_synced();
        Ok(())
    }

    /// Restore the pool's initial base/quote split at the given price.
    ///
    /// Total value is preserved; only the split between base and quote moves.
    pub async fn rebalance(
        &self,
        market_maker_id: u64,
        price: Decimal,
    ) -> Result<(), PoolError> {
        let tracker = self
            .tracker(market_maker_id)
            .ok_or(PoolError::NotFound { market_maker_id })?;

        let mut balances = tracker.balances();
        let initial_base_value = balances.initial_base * price;
        let initial_total = initial_base_value + balances.initial_quote;
        if initial_total.is_zero() || price.is_zero() {
            return Ok(());
        }

        let total = balances.total_value(price);
        let base_fraction = initial_base_value / initial_total;
        balances.base_currency_balance = total * base_fraction / price;
        balances.quote_currency_balance = total * (Decimal::ONE - base_fraction);

        debug!(market_maker_id, %price, "rebalanced pool to initial split");
        self.pool_store.update_pool(market_maker_id, &balances).await?;
        tracker.set_balances(balances);
        tracker.mark_synced();
        Ok(())
    }

    /// Push any stale trackers back to the store (periodic maintenance).
    pub async fn sync_all(&self) {
        for entry in self.trackers.iter() {
            let tracker = entry.value();
            if !tracker.needs_sync() {
                continue;
            }
            match self
                .pool_store
                .update_pool(tracker.market_maker_id(), &tracker.balances())
                .await
            {
                Ok(()) => tracker.mark_synced(),
                Err(error) => warn!(
                    market_maker_id = tracker.market_maker_id(),
                    %error,
                    "pool sync failed"
                ),
            }
        }
    }
}

/// Shared handle to the pool manager.
pub type SharedPoolManager = Arc<PoolManager>;

pub fn create_pool_manager(
    pool_store: Arc<dyn PoolStore>,
    trade_store: Arc<dyn TradeStore>,
) -> SharedPoolManager {
    Arc::new(PoolManager::new(pool_store, trade_store))
}
