//! Copy-trading transactional store seam.
//!
//! Follower replication moves money, so it runs under the strongest guarantee
//! in the system: a serializable transaction with row-level locks. The
//! transaction object buffers the whole unit of work; any failure rolls
//! everything back together.

use async_trait::async_trait;
use model::{Allocation, CopyTrade, CopyTradeStatus, Follower, LeaderTrade};
use rust_decimal::Decimal;

use crate::error::StoreResult;

/// Non-transactional copy-trading reads and leader-trade persistence.
#[async_trait]
pub trait CopyStore: Send + Sync {
    /// Active followers of a leader.
    async fn active_followers(&self, leader_id: u64) -> StoreResult<Vec<Follower>>;

    /// Persist an intercepted leader trade in PENDING status; returns its id.
    async fn insert_leader_trade(&self, trade: &LeaderTrade) -> StoreResult<u64>;

    async fn update_leader_trade_status(
        &self,
        leader_trade_id: u64,
        status: CopyTradeStatus,
    ) -> StoreResult<()>;

    /// Begin a serializable transaction.
    async fn begin(&self) -> StoreResult<Box<dyn CopyTxn>>;
}

/// One serializable unit of follower replication.
///
/// `lock_*` methods take row locks for the duration of the transaction.
/// Dropping the transaction without `commit` discards every staged write.
#[async_trait]
pub trait CopyTxn: Send {
    async fn lock_follower(&mut self, follower_id: u64) -> StoreResult<Follower>;

    async fn lock_allocation(
        &mut self,
        follower_id: u64,
        symbol: &str,
    ) -> StoreResult<Allocation>;

    async fn wallet_balance(&mut self, follower_id: u64, currency: &str)
        -> StoreResult<Decimal>;

    /// Debit fails closed when the balance is insufficient.
    async fn debit_wallet(
        &mut self,
        follower_id: u64,
        currency: &str,
        amount: Decimal,
    ) -> StoreResult<()>;

    async fn create_copy_trade(&mut self, trade: &CopyTrade) -> StoreResult<u64>;

    async fn add_allocation_used(
        &mut self,
        follower_id: u64,
        symbol: &str,
        quote_delta: Decimal,
        base_delta: Decimal,
    ) -> StoreResult<()>;

    /// Quote amount this follower has already committed today.
    async fn daily_quote_used(
        &mut self,
        follower_id: u64,
        day_key: &str,
    ) -> StoreResult<Decimal>;

    async fn add_daily_quote_used(
        &mut self,
        follower_id: u64,
        day_key: &str,
        amount: Decimal,
    ) -> StoreResult<()>;

    /// Audit row for the replication.
    async fn record_transaction(&mut self, follower_id: u64, detail: &str) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>);
}
