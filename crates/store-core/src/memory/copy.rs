//! In-memory copy-trading store with serializable transactions.
//!
//! One tokio Mutex guards all copy-trading rows; holding it for the duration
//! of a transaction gives the serializable, row-locked semantics the real
//! store provides. Rollback restores a snapshot taken at `begin`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use model::{Allocation, CopyTrade, CopyTradeStatus, Follower, LeaderTrade};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::copy::{CopyStore, CopyTxn};
use crate::error::{StoreError, StoreResult};

#[derive(Default, Clone)]
struct CopyInner {
    followers: HashMap<u64, Follower>,
    allocations: HashMap<(u64, String), Allocation>,
    wallets: HashMap<(u64, String), Decimal>,
    copy_trades: Vec<CopyTrade>,
    leader_trades: HashMap<u64, (LeaderTrade, CopyTradeStatus)>,
    daily_used: HashMap<(u64, String), Decimal>,
    audit: Vec<(u64, String)>,
    next_copy_trade_id: u64,
    next_leader_trade_id: u64,
}

#[derive(Default)]
pub struct MemoryCopyStore {
    inner: Arc<Mutex<CopyInner>>,
}

impl MemoryCopyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_follower(&self, follower: Follower) {
        let mut inner = self.inner.lock().await;
        inner.followers.insert(follower.follower_id, follower);
    }

    pub async fn seed_allocation(&self, allocation: Allocation) {
        let mut inner = self.inner.lock().await;
        inner.allocations.insert(
            (allocation.follower_id, allocation.symbol.clone()),
            allocation,
        );
    }

    pub async fn seed_wallet(&self, follower_id: u64, currency: &str, balance: Decimal) {
        let mut inner = self.inner.lock().await;
        inner
            .wallets
            .insert((follower_id, currency.to_string()), balance);
    }

    pub async fn copy_trades(&self) -> Vec<CopyTrade> {
        self.inner.lock().await.copy_trades.clone()
    }

    pub async fn wallet(&self, follower_id: u64, currency: &str) -> Option<Decimal> {
        self.inner
            .lock()
            .await
            .wallets
            .get(&(follower_id, currency.to_string()))
            .copied()
    }

    pub async fn allocation(&self, follower_id: u64, symbol: &str) -> Option<Allocation> {
        self.inner
            .lock()
            .await
            .allocations
            .get(&(follower_id, symbol.to_string()))
            .cloned()
    }

    pub async fn audit_count(&self) -> usize {
        self.inner.lock().await.audit.len()
    }

    pub async fn leader_trade_status(&self, leader_trade_id: u64) -> Option<CopyTradeStatus> {
        self.inner
            .lock()
            .await
            .leader_trades
            .get(&leader_trade_id)
            .map(|(_, status)| *status)
    }
}

#[async_trait]
impl CopyStore for MemoryCopyStore {
    async fn active_followers(&self, leader_id: u64) -> StoreResult<Vec<Follower>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .followers
            .values()
            .filter(|f| f.leader_id == leader_id && f.is_active())
            .cloned()
            .collect())
    }

    async fn insert_leader_trade(&self, trade: &LeaderTrade) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        inner.next_leader_trade_id += 1;
        let id = inner.next_leader_trade_id;
        inner
            .leader_trades
            .insert(id, (trade.clone(), CopyTradeStatus::Pending));
        Ok(id)
    }

    async fn update_leader_trade_status(
        &self,
        leader_trade_id: u64,
        status: CopyTradeStatus,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        match inner.leader_trades.get_mut(&leader_trade_id) {
            Some(entry) => {
                entry.1 = status;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!(
                "leader trade {}",
                leader_trade_id
            ))),
        }
    }

    async fn begin(&self) -> StoreResult<Box<dyn CopyTxn>> {
        let guard = self.inner.clone().lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryCopyTxn { guard, snapshot }))
    }
}

struct MemoryCopyTxn {
    guard: OwnedMutexGuard<CopyInner>,
    snapshot: CopyInner,
}

#[async_trait]
impl CopyTxn for MemoryCopyTxn {
    async fn lock_follower(&mut self, follower_id: u64) -> StoreResult<Follower> {
        self.guard
            .followers
            .get(&follower_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("follower {}", follower_id)))
    }

    async fn lock_allocation(
        &mut self,
        follower_id: u64,
        symbol: &str,
    ) -> StoreResult<Allocation> {
        self.guard
            .allocations
            .get(&(follower_id, symbol.to_string()))
            .cloned()
            .ok_or_else(|| {
                StoreError::NotFound(format!("allocation {}/{}", follower_id, symbol))
            })
    }

    async fn wallet_balance(
        &mut self,
        follower_id: u64,
        currency: &str,
    ) -> StoreResult<Decimal> {
        Ok(self
            .guard
            .wallets
            .get(&(follower_id, currency.to_string()))
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn debit_wallet(
        &mut self,
        follower_id: u64,
        currency: &str,
        amount: Decimal,
    ) -> StoreResult<()> {
        let key = (follower_id, currency.to_string());
        let balance = self.guard.wallets.get(&key).copied().unwrap_or(Decimal::ZERO);
        if balance < amount {
            return Err(StoreError::Conflict(format!(
                "wallet {}/{} has {} < {}",
                follower_id, currency, balance, amount
            )));
        }
        self.guard.wallets.insert(key, balance - amount);
        Ok(())
    }

    async fn create_copy_trade(&mut self, trade: &CopyTrade) -> StoreResult<u64> {
        self.guard.next_copy_trade_id += 1;
        let id = self.guard.next_copy_trade_id;
        let mut trade = trade.clone();
        trade.copy_trade_id = id;
        self.guard.copy_trades.push(trade);
        Ok(id)
    }

    async fn add_allocation_used(
        &mut self,
        follower_id: u64,
        symbol: &str,
        quote_delta: Decimal,
        base_delta: Decimal,
    ) -> StoreResult<()> {
        let key = (follower_id, symbol.to_string());
        let alloc = self
            .guard
            .allocations
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(format!("allocation {}/{}", follower_id, symbol)))?;

        let new_quote = alloc.quote_used_amount + quote_delta;
        let new_base = alloc.base_used_amount + base_delta;
        // used <= total is a hard invariant of the allocation row
        if new_quote > alloc.quote_amount || new_base > alloc.base_amount {
            return Err(StoreError::Conflict(format!(
                "allocation {}/{} would be overcommitted",
                follower_id, symbol
            )));
        }
        alloc.quote_used_amount = new_quote;
        alloc.base_used_amount = new_base;
        Ok(())
    }

    async fn daily_quote_used(
        &mut self,
        follower_id: u64,
        day_key: &str,
    ) -> StoreResult<Decimal> {
        Ok(self
            .guard
            .daily_used
            .get(&(follower_id, day_key.to_string()))
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn add_daily_quote_used(
        &mut self,
        follower_id: u64,
        day_key: &str,
        amount: Decimal,
    ) -> StoreResult<()> {
        let entry = self
            .guard
            .daily_used
            .entry((follower_id, day_key.to_string()))
            .or_insert(Decimal::ZERO);
        *entry += amount;
        Ok(())
    }

    async fn record_transaction(&mut self, follower_id: u64, detail: &str) -> StoreResult<()> {
        self.guard.audit.push((follower_id, detail.to_string()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        // Writes were applied under the lock; releasing it publishes them.
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) {
        *self.guard = self.snapshot.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{CopyMode, FollowerStatus};
    use rust_decimal_macros::dec;

    fn make_follower(id: u64, leader: u64, status: FollowerStatus) -> Follower {
        Follower {
            follower_id: id,
            leader_id: leader,
            copy_mode: CopyMode::Proportional,
            risk_multiplier: dec!(1),
            fixed_amount: dec!(0),
            fixed_ratio: dec!(0),
            max_position_size: dec!(1000),
            max_daily_loss: dec!(100),
            status,
        }
    }

    fn make_allocation(follower_id: u64) -> Allocation {
        Allocation {
            follower_id,
            symbol: "BTC/USDT".to_string(),
            quote_amount: dec!(1000),
            quote_used_amount: dec!(0),
            base_amount: dec!(1),
            base_used_amount: dec!(0),
        }
    }

    #[tokio::test]
    async fn test_active_followers_filters() {
        let store = MemoryCopyStore::new();
        store.seed_follower(make_follower(1, 7, FollowerStatus::Active)).await;
        store.seed_follower(make_follower(2, 7, FollowerStatus::Paused)).await;
        store.seed_follower(make_follower(3, 8, FollowerStatus::Active)).await;

        let followers = store.active_followers(7).await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].follower_id, 1);
    }

    #[tokio::test]
    async fn test_txn_commit_publishes_writes() {
        let store = MemoryCopyStore::new();
        store.seed_follower(make_follower(1, 7, FollowerStatus::Active)).await;
        store.seed_wallet(1, "USDT", dec!(500)).await;

        let mut txn = store.begin().await.unwrap();
        txn.debit_wallet(1, "USDT", dec!(200)).await.unwrap();
        txn.commit().await.unwrap();

        assert_eq!(store.wallet(1, "USDT").await, Some(dec!(300)));
    }

    #[tokio::test]
    async fn test_txn_rollback_discards_writes() {
        let store = MemoryCopyStore::new();
        store.seed_wallet(1, "USDT", dec!(500)).await;
        store.seed_allocation(make_allocation(1)).await;

        let mut txn = store.begin().await.unwrap();
        txn.debit_wallet(1, "USDT", dec!(200)).await.unwrap();
        txn.add_allocation_used(1, "BTC/USDT", dec!(200), dec!(0))
            .await
            .unwrap();
        txn.rollback().await;

        assert_eq!(store.wallet(1, "USDT").await, Some(dec!(500)));
        let alloc = store.allocation(1, "BTC/USDT").await.unwrap();
        assert_eq!(alloc.quote_used_amount, dec!(0));
    }

    #[tokio::test]
    async fn test_debit_fails_closed() {
        let store = MemoryCopyStore::new();
        store.seed_wallet(1, "USDT", dec!(100)).await;

        let mut txn = store.begin().await.unwrap();
        let result = txn.debit_wallet(1, "USDT", dec!(200)).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        txn.rollback().await;

        assert_eq!(store.wallet(1, "USDT").await, Some(dec!(100)));
    }

    #[tokio::test]
    async fn test_allocation_overcommit_rejected() {
        let store = MemoryCopyStore::new();
        store.seed_allocation(make_allocation(1)).await;

        let mut txn = store.begin().await.unwrap();
        let result = txn
            .add_allocation_used(1, "BTC/USDT", dec!(1500), dec!(0))
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        txn.rollback().await;
    }
}
