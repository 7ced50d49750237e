//! Queue drain and follower replication.

use std::sync::Arc;
use std::time::Duration;

use common::{epoch_ms, utc_day_key, RetryBackoff};
use metrics::SharedMetrics;
use model::{
    CopyMode, CopyTrade, CopyTradeStatus, Follower, HistoryEvent, HistoryEventKind,
    LeaderTrade, Side,
};
use rust_decimal::Decimal;
use store_core::{CopyStore, CopyTxn, HistoryStore, StoreError};
use tokio::sync::{watch, Semaphore};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::CopyConfig;
use crate::error::CopyError;
use crate::queue::{CopyTask, SharedCopyQueue};

/// Drains the copy queue and replicates leader trades to followers.
///
/// One task is drained per poll; within a task, followers fan out
/// concurrently under a semaphore. Each follower's replication is a single
/// serializable transaction, so a half-applied copy can never be observed.
pub struct CopyTradeProcessor {
    store: Arc<dyn CopyStore>,
    queue: SharedCopyQueue,
    config: CopyConfig,
    history: Arc<dyn HistoryStore>,
    metrics: SharedMetrics,
}

impl CopyTradeProcessor {
    pub fn new(
        store: Arc<dyn CopyStore>,
        queue: SharedCopyQueue,
        config: CopyConfig,
        history: Arc<dyn HistoryStore>,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            store,
            queue,
            config,
            history,
            metrics,
        }
    }

    /// Poll loop; runs until the shutdown signal flips to `true`.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.drain_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            drain_interval_ms = self.config.drain_interval_ms,
            "copy-trade processor started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    if let Some(task) = self.queue.pop() {
                        self.process_task(task).await;
                    }
                }
            }
        }

        info!(pending = self.queue.len(), "copy-trade processor stopped");
    }

    /// Replicate one leader trade to every active follower.
    pub async fn process_task(self: &Arc<Self>, task: CopyTask) {
        let followers = match self.store.active_followers(task.trade.leader_id).await {
            Ok(followers) => followers,
            Err(err) => {
                warn!(
                    leader_trade_id = task.leader_trade_id,
                    error = %err,
                    "could not load followers, requeueing"
                );
                self.queue.push(task.leader_trade_id, task.trade);
                return;
            }
        };

        // Followers may have unsubscribed between enqueue and drain.
        if followers.is_empty() {
            debug!(
                leader_trade_id = task.leader_trade_id,
                "no active followers remain"
            );
            self.set_leader_status(task.leader_trade_id, CopyTradeStatus::Cancelled)
                .await;
            return;
        }

        let total = followers.len();
        let semaphore = Arc::new(Semaphore::new(self.config.follower_batch_size));
        let mut handles = Vec::with_capacity(total);
        for follower in followers {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let processor = Arc::clone(self);
            let trade = task.trade.clone();
            handles.push(tokio::spawn(async move {
                let result = processor.replicate_with_retry(&follower, &trade).await;
                drop(permit);
                result
            }));
        }

        let mut replicated = 0usize;
        for handle in handles {
            if matches!(handle.await, Ok(Ok(()))) {
                replicated += 1;
            }
        }

        let status = if replicated == total {
            CopyTradeStatus::Filled
        } else if replicated > 0 {
            CopyTradeStatus::PartiallyFilled
        } else {
            CopyTradeStatus::Failed
        };
        self.set_leader_status(task.leader_trade_id, status).await;

        let kind = if replicated > 0 {
            HistoryEventKind::CopyTradeExecuted
        } else {
            HistoryEventKind::CopyTradeFailed
        };
        self.record_history(
            kind,
            format!(
                "leader trade {}: {}/{} followers replicated",
                task.leader_trade_id, replicated, total
            ),
        )
        .await;

        info!(
            leader_trade_id = task.leader_trade_id,
            replicated, total, "leader trade processed"
        );
    }

    /// Retry loop around one follower's replication.
    ///
    /// Business-rule rejections are terminal and fail immediately; store
    /// failures back off linearly and retry up to the configured limit.
    async fn replicate_with_retry(
        &self,
        follower: &Follower,
        trade: &LeaderTrade,
    ) -> Result<(), CopyError> {
        let mut backoff = RetryBackoff::new(
            Duration::from_millis(self.config.retry_base_ms),
            Duration::from_millis(
                self.config.retry_base_ms * u64::from(self.config.max_retries.max(1)),
            ),
            0.1,
        );
        let mut attempt = 1u32;
        loop {
            match self.process_copy_order(follower, trade).await {
                Ok(copy_trade_id) => {
                    self.metrics.inc_copy_trades_replicated();
                    debug!(
                        copy_trade_id,
                        follower_id = follower.follower_id,
                        "copy trade placed"
                    );
                    return Ok(());
                }
                Err(err) if err.is_terminal() => {
                    self.metrics.inc_copy_trades_failed();
                    warn!(
                        follower_id = follower.follower_id,
                        error = %err,
                        "copy trade rejected"
                    );
                    return Err(err);
                }
                Err(err) => {
                    if attempt >= self.config.max_retries {
                        self.metrics.inc_copy_trades_failed();
                        warn!(
                            follower_id = follower.follower_id,
                            attempts = attempt,
                            error = %err,
                            "copy trade failed after retries"
                        );
                        return Err(err);
                    }
                    warn!(
                        follower_id = follower.follower_id,
                        attempt,
                        error = %err,
                        "copy trade failed, retrying"
                    );
                    tokio::time::sleep(backoff.next_delay()).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One follower's replication as a single serializable transaction.
    async fn process_copy_order(
        &self,
        follower: &Follower,
        trade: &LeaderTrade,
    ) -> Result<u64, CopyError> {
        let mut txn = self.store.begin().await?;
        match self
            .replicate_in_txn(txn.as_mut(), follower.follower_id, trade)
            .await
        {
            Ok(copy_trade_id) => {
                txn.commit().await?;
                Ok(copy_trade_id)
            }
            Err(err) => {
                txn.rollback().await;
                Err(err)
            }
        }
    }

    async fn replicate_in_txn(
        &self,
        txn: &mut dyn CopyTxn,
        follower_id: u64,
        trade: &LeaderTrade,
    ) -> Result<u64, CopyError> {
        // Re-read the follower under the row lock; the listener's view may
        // be stale by now.
        let follower = txn.lock_follower(follower_id).await.map_err(|err| match err {
            StoreError::NotFound(_) => CopyError::InactiveFollower { follower_id },
            other => CopyError::Store(other),
        })?;
        if !follower.is_active() {
            return Err(CopyError::InactiveFollower { follower_id });
        }

        let allocation = txn
            .lock_allocation(follower_id, &trade.symbol)
            .await
            .map_err(|err| match err {
                StoreError::NotFound(_) => CopyError::NoAllocation {
                    follower_id,
                    symbol: trade.symbol.clone(),
                },
                other => CopyError::Store(other),
            })?;

        let (base_ccy, quote_ccy) =
            trade
                .symbol
                .split_once('/')
                .ok_or_else(|| CopyError::NoAllocation {
                    follower_id,
                    symbol: trade.symbol.clone(),
                })?;

        let day_key = utc_day_key(epoch_ms());
        let daily_used = txn.daily_quote_used(follower_id, &day_key).await?;
        let daily_remaining = follower.max_daily_loss - daily_used;
        if daily_remaining <= Decimal::ZERO {
            return Err(CopyError::DailyLimitReached { follower_id });
        }

        let mut amount = match follower.copy_mode {
            CopyMode::Proportional => trade.amount * follower.risk_multiplier,
            CopyMode::FixedAmount => follower.fixed_amount / trade.price,
            CopyMode::FixedRatio => trade.amount * follower.fixed_ratio,
        };
        amount = amount.min(follower.max_position_size / trade.price);
        amount = amount.min(daily_remaining / trade.price);
        match trade.side {
            Side::Buy => {
                amount = amount.min(allocation.available_quote() / trade.price);
                let wallet = txn.wallet_balance(follower_id, quote_ccy).await?;
                amount = amount.min(wallet / trade.price);
            }
            Side::Sell => {
                amount = amount.min(allocation.available_base());
                let wallet = txn.wallet_balance(follower_id, base_ccy).await?;
                amount = amount.min(wallet);
            }
        }

        if amount <= Decimal::ZERO {
            let currency = match trade.side {
                Side::Buy => quote_ccy,
                Side::Sell => base_ccy,
            };
            return Err(CopyError::InsufficientBalance {
                follower_id,
                currency: currency.to_string(),
            });
        }

        let cost = amount * trade.price;
        if cost < self.config.min_order_quote {
            return Err(CopyError::BelowMinimumOrder {
                cost,
                minimum: self.config.min_order_quote,
            });
        }

        let copy_trade = CopyTrade {
            copy_trade_id: 0,
            follower_id,
            leader_id: trade.leader_id,
            symbol: trade.symbol.clone(),
            side: trade.side,
            price: trade.price,
            amount,
            status: CopyTradeStatus::Open,
            created_at_ms: epoch_ms(),
        };
        let copy_trade_id = txn.create_copy_trade(&copy_trade).await?;

        match trade.side {
            Side::Buy => {
                txn.debit_wallet(follower_id, quote_ccy, cost).await?;
                txn.add_allocation_used(follower_id, &trade.symbol, cost, Decimal::ZERO)
                    .await?;
            }
            Side::Sell => {
                txn.debit_wallet(follower_id, base_ccy, amount).await?;
                txn.add_allocation_used(follower_id, &trade.symbol, Decimal::ZERO, amount)
                    .await?;
            }
        }
        txn.add_daily_quote_used(follower_id, &day_key, cost).await?;
        txn.record_transaction(
            follower_id,
            &format!(
                "copy {} {:?} {} {} @ {} (leader {})",
                copy_trade_id, trade.side, amount, trade.symbol, trade.price, trade.leader_id
            ),
        )
        .await?;

        Ok(copy_trade_id)
    }

    async fn set_leader_status(&self, leader_trade_id: u64, status: CopyTradeStatus) {
        if let Err(err) = self
            .store
            .update_leader_trade_status(leader_trade_id, status)
            .await
        {
            warn!(leader_trade_id, error = %err, "failed to update leader trade status");
        }
    }

    async fn record_history(&self, kind: HistoryEventKind, detail: String) {
        let event = HistoryEvent {
            market_maker_id: None,
            kind,
            detail,
            timestamp_ms: epoch_ms(),
        };
        if let Err(err) = self.history.record(&event).await {
            debug!(error = %err, "history record failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::create_copy_queue;
    use async_trait::async_trait;
    use metrics::create_metrics;
    use model::{Allocation, FollowerStatus};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};
    use store_core::memory::{MemoryCopyStore, MemoryStore};
    use store_core::StoreResult;

    fn make_follower(id: u64, leader: u64, mode: CopyMode) -> Follower {
        Follower {
            follower_id: id,
            leader_id: leader,
            copy_mode: mode,
            risk_multiplier: dec!(1),
            fixed_amount: dec!(100),
            fixed_ratio: dec!(0.5),
            max_position_size: dec!(10000),
            max_daily_loss: dec!(10000),
            status: FollowerStatus::Active,
        }
    }

    fn make_allocation(follower_id: u64) -> Allocation {
        Allocation {
            follower_id,
            symbol: "BTC/USDT".to_string(),
            quote_amount: dec!(10000),
            quote_used_amount: dec!(0),
            base_amount: dec!(10),
            base_used_amount: dec!(0),
        }
    }

    fn make_trade(leader_id: u64, side: Side, price: Decimal, amount: Decimal) -> LeaderTrade {
        LeaderTrade {
            leader_id,
            symbol: "BTC/USDT".to_string(),
            side,
            price,
            amount,
            created_at_ms: 0,
        }
    }

    struct Fixture {
        store: Arc<MemoryCopyStore>,
        history: Arc<MemoryStore>,
        queue: SharedCopyQueue,
        processor: Arc<CopyTradeProcessor>,
    }

    fn make_fixture(config: CopyConfig) -> Fixture {
        let store = Arc::new(MemoryCopyStore::new());
        let history = Arc::new(MemoryStore::new());
        let queue = create_copy_queue();
        let processor = Arc::new(CopyTradeProcessor::new(
            store.clone(),
            queue.clone(),
            config,
            history.clone(),
            create_metrics(),
        ));
        Fixture {
            store,
            history,
            queue,
            processor,
        }
    }

    async fn enqueue(fixture: &Fixture, trade: LeaderTrade) -> CopyTask {
        let id = fixture.store.insert_leader_trade(&trade).await.unwrap();
        fixture.queue.push(id, trade);
        fixture.queue.pop().unwrap()
    }

    #[tokio::test]
    async fn test_buy_replication_commits_all_rows() {
        let fixture = make_fixture(CopyConfig::default());
        fixture
            .store
            .seed_follower(make_follower(1, 7, CopyMode::Proportional))
            .await;
        fixture.store.seed_allocation(make_allocation(1)).await;
        fixture.store.seed_wallet(1, "USDT", dec!(1000)).await;

        let task = enqueue(&fixture, make_trade(7, Side::Buy, dec!(100), dec!(2))).await;
        let leader_trade_id = task.leader_trade_id;
        fixture.processor.process_task(task).await;

        let trades = fixture.store.copy_trades().await;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].amount, dec!(2));
        assert_eq!(trades[0].status, CopyTradeStatus::Open);
        assert_eq!(fixture.store.wallet(1, "USDT").await, Some(dec!(800)));
        let alloc = fixture.store.allocation(1, "BTC/USDT").await.unwrap();
        assert_eq!(alloc.quote_used_amount, dec!(200));
        assert_eq!(fixture.store.audit_count().await, 1);
        assert_eq!(
            fixture.store.leader_trade_status(leader_trade_id).await,
            Some(CopyTradeStatus::Filled)
        );
        assert_eq!(fixture.processor.metrics.copy_trades_replicated(), 1);
    }

    #[tokio::test]
    async fn test_buy_amount_never_exceeds_wallet() {
        let fixture = make_fixture(CopyConfig::default());
        fixture
            .store
            .seed_follower(make_follower(1, 7, CopyMode::Proportional))
            .await;
        fixture.store.seed_allocation(make_allocation(1)).await;
        fixture.store.seed_wallet(1, "USDT", dec!(150)).await;

        let task = enqueue(&fixture, make_trade(7, Side::Buy, dec!(100), dec!(2))).await;
        fixture.processor.process_task(task).await;

        let trades = fixture.store.copy_trades().await;
        assert_eq!(trades.len(), 1);
        assert!(trades[0].amount * trades[0].price <= dec!(150));
        assert_eq!(trades[0].amount, dec!(1.5));
        assert_eq!(fixture.store.wallet(1, "USDT").await, Some(dec!(0)));
    }

    #[tokio::test]
    async fn test_sell_debits_base_side() {
        let fixture = make_fixture(CopyConfig::default());
        fixture
            .store
            .seed_follower(make_follower(1, 7, CopyMode::Proportional))
            .await;
        fixture.store.seed_allocation(make_allocation(1)).await;
        fixture.store.seed_wallet(1, "BTC", dec!(0.5)).await;

        let task = enqueue(&fixture, make_trade(7, Side::Sell, dec!(100), dec!(1))).await;
        fixture.processor.process_task(task).await;

        let trades = fixture.store.copy_trades().await;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].side, Side::Sell);
        assert_eq!(trades[0].amount, dec!(0.5));
        assert_eq!(fixture.store.wallet(1, "BTC").await, Some(dec!(0)));
        let alloc = fixture.store.allocation(1, "BTC/USDT").await.unwrap();
        assert_eq!(alloc.base_used_amount, dec!(0.5));
    }

    #[tokio::test]
    async fn test_daily_limit_is_terminal() {
        let fixture = make_fixture(CopyConfig::default());
        let mut follower = make_follower(1, 7, CopyMode::Proportional);
        follower.max_daily_loss = dec!(0);
        fixture.store.seed_follower(follower).await;
        fixture.store.seed_allocation(make_allocation(1)).await;
        fixture.store.seed_wallet(1, "USDT", dec!(1000)).await;

        let task = enqueue(&fixture, make_trade(7, Side::Buy, dec!(100), dec!(2))).await;
        let leader_trade_id = task.leader_trade_id;
        fixture.processor.process_task(task).await;

        assert!(fixture.store.copy_trades().await.is_empty());
        assert_eq!(fixture.store.wallet(1, "USDT").await, Some(dec!(1000)));
        assert_eq!(
            fixture.store.leader_trade_status(leader_trade_id).await,
            Some(CopyTradeStatus::Failed)
        );
        assert_eq!(fixture.processor.metrics.copy_trades_failed(), 1);
    }

    #[tokio::test]
    async fn test_below_minimum_rolls_back() {
        let fixture = make_fixture(CopyConfig::default());
        let mut follower = make_follower(1, 7, CopyMode::FixedAmount);
        follower.fixed_amount = dec!(5);
        fixture.store.seed_follower(follower).await;
        fixture.store.seed_allocation(make_allocation(1)).await;
        fixture.store.seed_wallet(1, "USDT", dec!(1000)).await;

        let task = enqueue(&fixture, make_trade(7, Side::Buy, dec!(100), dec!(2))).await;
        fixture.processor.process_task(task).await;

        assert!(fixture.store.copy_trades().await.is_empty());
        assert_eq!(fixture.store.wallet(1, "USDT").await, Some(dec!(1000)));
        let alloc = fixture.store.allocation(1, "BTC/USDT").await.unwrap();
        assert_eq!(alloc.quote_used_amount, dec!(0));
        assert_eq!(fixture.store.audit_count().await, 0);
    }

    #[tokio::test]
    async fn test_fixed_ratio_scales_leader_amount() {
        let fixture = make_fixture(CopyConfig::default());
        fixture
            .store
            .seed_follower(make_follower(1, 7, CopyMode::FixedRatio))
            .await;
        fixture.store.seed_allocation(make_allocation(1)).await;
        fixture.store.seed_wallet(1, "USDT", dec!(1000)).await;

        let task = enqueue(&fixture, make_trade(7, Side::Buy, dec!(100), dec!(4))).await;
        fixture.processor.process_task(task).await;

        let trades = fixture.store.copy_trades().await;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].amount, dec!(2.0));
    }

    #[tokio::test]
    async fn test_partial_success_marks_partially_filled() {
        let fixture = make_fixture(CopyConfig::default());
        fixture
            .store
            .seed_follower(make_follower(1, 7, CopyMode::Proportional))
            .await;
        fixture.store.seed_allocation(make_allocation(1)).await;
        fixture.store.seed_wallet(1, "USDT", dec!(1000)).await;
        fixture
            .store
            .seed_follower(make_follower(2, 7, CopyMode::Proportional))
            .await;
        fixture.store.seed_allocation(make_allocation(2)).await;
        fixture.store.seed_wallet(2, "USDT", dec!(5)).await;

        let task = enqueue(&fixture, make_trade(7, Side::Buy, dec!(100), dec!(2))).await;
        let leader_trade_id = task.leader_trade_id;
        fixture.processor.process_task(task).await;

        let trades = fixture.store.copy_trades().await;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].follower_id, 1);
        assert_eq!(
            fixture.store.leader_trade_status(leader_trade_id).await,
            Some(CopyTradeStatus::PartiallyFilled)
        );
        assert_eq!(fixture.processor.metrics.copy_trades_replicated(), 1);
        assert_eq!(fixture.processor.metrics.copy_trades_failed(), 1);
    }

    #[tokio::test]
    async fn test_followers_gone_by_drain_time_cancels() {
        let fixture = make_fixture(CopyConfig::default());
        fixture
            .store
            .seed_follower(make_follower(1, 7, CopyMode::Proportional))
            .await;

        let task = enqueue(&fixture, make_trade(7, Side::Buy, dec!(100), dec!(2))).await;
        let leader_trade_id = task.leader_trade_id;

        let mut follower = make_follower(1, 7, CopyMode::Proportional);
        follower.status = FollowerStatus::Terminated;
        fixture.store.seed_follower(follower).await;

        fixture.processor.process_task(task).await;

        assert!(fixture.store.copy_trades().await.is_empty());
        assert_eq!(
            fixture.store.leader_trade_status(leader_trade_id).await,
            Some(CopyTradeStatus::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_history_records_execution() {
        let fixture = make_fixture(CopyConfig::default());
        fixture
            .store
            .seed_follower(make_follower(1, 7, CopyMode::Proportional))
            .await;
        fixture.store.seed_allocation(make_allocation(1)).await;
        fixture.store.seed_wallet(1, "USDT", dec!(1000)).await;

        let task = enqueue(&fixture, make_trade(7, Side::Buy, dec!(100), dec!(2))).await;
        fixture.processor.process_task(task).await;

        let events = fixture.history.history_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, HistoryEventKind::CopyTradeExecuted);
    }

    /// Delegates to a real store but fails `begin` a fixed number of times.
    struct FlakyCopyStore {
        inner: MemoryCopyStore,
        failures_left: AtomicU32,
    }

    impl FlakyCopyStore {
        fn new(inner: MemoryCopyStore, failures: u32) -> Self {
            Self {
                inner,
                failures_left: AtomicU32::new(failures),
            }
        }
    }

    #[async_trait]
    impl CopyStore for FlakyCopyStore {
        async fn active_followers(&self, leader_id: u64) -> StoreResult<Vec<Follower>> {
            self.inner.active_followers(leader_id).await
        }

        async fn insert_leader_trade(&self, trade: &LeaderTrade) -> StoreResult<u64> {
            self.inner.insert_leader_trade(trade).await
        }

        async fn update_leader_trade_status(
            &self,
            leader_trade_id: u64,
            status: CopyTradeStatus,
        ) -> StoreResult<()> {
            self.inner
                .update_leader_trade_status(leader_trade_id, status)
                .await
        }

        async fn begin(&self) -> StoreResult<Box<dyn CopyTxn>> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Timeout);
            }
            self.inner.begin().await
        }
    }

    async fn make_flaky_processor(
        failures: u32,
        config: CopyConfig,
    ) -> (Arc<CopyTradeProcessor>, SharedCopyQueue, u64) {
        let inner = MemoryCopyStore::new();
        inner
            .seed_follower(make_follower(1, 7, CopyMode::Proportional))
            .await;
        inner.seed_allocation(make_allocation(1)).await;
        inner.seed_wallet(1, "USDT", dec!(1000)).await;
        let trade = make_trade(7, Side::Buy, dec!(100), dec!(2));
        let leader_trade_id = inner.insert_leader_trade(&trade).await.unwrap();

        let flaky = Arc::new(FlakyCopyStore::new(inner, failures));
        let queue = create_copy_queue();
        queue.push(leader_trade_id, trade);
        let processor = Arc::new(CopyTradeProcessor::new(
            flaky,
            queue.clone(),
            config,
            Arc::new(MemoryStore::new()),
            create_metrics(),
        ));
        (processor, queue, leader_trade_id)
    }

    #[tokio::test]
    async fn test_transient_failure_retries_then_succeeds() {
        let config = CopyConfig::default().with_retry_base_ms(1);
        let (processor, queue, _) = make_flaky_processor(2, config).await;

        let task = queue.pop().unwrap();
        processor.process_task(task).await;

        assert_eq!(processor.metrics.copy_trades_replicated(), 1);
        assert_eq!(processor.metrics.copy_trades_failed(), 0);
    }

    #[tokio::test]
    async fn test_transient_failure_exhausts_retries() {
        let config = CopyConfig::default().with_retry_base_ms(1).with_max_retries(2);
        let (processor, queue, _) = make_flaky_processor(10, config).await;

        let task = queue.pop().unwrap();
        processor.process_task(task).await;

        assert_eq!(processor.metrics.copy_trades_replicated(), 0);
        assert_eq!(processor.metrics.copy_trades_failed(), 1);
    }

    #[tokio::test]
    async fn test_run_drains_queue_and_stops() {
        let config = CopyConfig::default().with_drain_interval_ms(5);
        let fixture = make_fixture(config);
        fixture
            .store
            .seed_follower(make_follower(1, 7, CopyMode::Proportional))
            .await;
        fixture.store.seed_allocation(make_allocation(1)).await;
        fixture.store.seed_wallet(1, "USDT", dec!(1000)).await;

        let trade = make_trade(7, Side::Buy, dec!(100), dec!(2));
        let id = fixture.store.insert_leader_trade(&trade).await.unwrap();
        fixture.queue.push(id, trade);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(fixture.processor.clone().run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(fixture.queue.is_empty());
        assert_eq!(fixture.store.copy_trades().await.len(), 1);
    }
}
