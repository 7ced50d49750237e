//! Leader order interception.

use std::sync::Arc;

use model::LeaderTrade;
use store_core::CopyStore;
use tracing::debug;

use crate::error::CopyError;
use crate::queue::SharedCopyQueue;

/// Intercepts leader orders and enqueues them for replication.
///
/// Sits on the leader's order-creation path, so it does the minimum there:
/// one follower lookup, one insert, one non-blocking queue push. The heavy
/// per-follower work happens later in the processor.
pub struct TradeListener {
    store: Arc<dyn CopyStore>,
    queue: SharedCopyQueue,
}

impl TradeListener {
    pub fn new(store: Arc<dyn CopyStore>, queue: SharedCopyQueue) -> Self {
        Self { store, queue }
    }

    /// Handle a newly created leader order.
    ///
    /// Returns `Ok(false)` when the leader has no active followers and the
    /// trade was dropped without being persisted.
    pub async fn on_order_created(&self, trade: LeaderTrade) -> Result<bool, CopyError> {
        let followers = self.store.active_followers(trade.leader_id).await?;
        if followers.is_empty() {
            debug!(
                leader_id = trade.leader_id,
                symbol = %trade.symbol,
                "no active followers, skipping"
            );
            return Ok(false);
        }

        let leader_trade_id = self.store.insert_leader_trade(&trade).await?;
        debug!(
            leader_trade_id,
            leader_id = trade.leader_id,
            symbol = %trade.symbol,
            followers = followers.len(),
            "queued leader trade for replication"
        );
        self.queue.push(leader_trade_id, trade);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::create_copy_queue;
    use model::{CopyMode, Follower, FollowerStatus, Side};
    use rust_decimal_macros::dec;
    use store_core::memory::MemoryCopyStore;

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

    fn make_trade(leader_id: u64) -> LeaderTrade {
        LeaderTrade {
            leader_id,
            symbol: "BTC/USDT".to_string(),
            side: Side::Buy,
            price: dec!(100),
            amount: dec!(2),
            created_at_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_no_followers_skips_persistence() {
        let store = Arc::new(MemoryCopyStore::new());
        let queue = create_copy_queue();
        let listener = TradeListener::new(store.clone(), queue.clone());

        let queued = listener.on_order_created(make_trade(7)).await.unwrap();

        assert!(!queued);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_inactive_followers_do_not_count() {
        let store = Arc::new(MemoryCopyStore::new());
        store
            .seed_follower(make_follower(1, 7, FollowerStatus::Paused))
            .await;
        let queue = create_copy_queue();
        let listener = TradeListener::new(store.clone(), queue.clone());

        let queued = listener.on_order_created(make_trade(7)).await.unwrap();

        assert!(!queued);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_active_follower_enqueues() {
        let store = Arc::new(MemoryCopyStore::new());
        store
            .seed_follower(make_follower(1, 7, FollowerStatus::Active))
            .await;
        let queue = create_copy_queue();
        let listener = TradeListener::new(store.clone(), queue.clone());

        let queued = listener.on_order_created(make_trade(7)).await.unwrap();

        assert!(queued);
        assert_eq!(queue.len(), 1);
        let task = queue.pop().unwrap();
        assert_eq!(task.trade.leader_id, 7);
        assert_eq!(
            store.leader_trade_status(task.leader_trade_id).await,
            Some(model::CopyTradeStatus::Pending)
        );
    }
}
