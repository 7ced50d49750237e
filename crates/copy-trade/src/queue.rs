//! Priority queue of pending replication tasks.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use model::LeaderTrade;
use parking_lot::Mutex;
use rust_decimal::Decimal;

/// One leader trade waiting to be replicated.
#[derive(Debug, Clone)]
pub struct CopyTask {
    pub leader_trade_id: u64,
    pub trade: LeaderTrade,
    /// Quote notional of the leader trade; larger trades replicate first.
    priority: Decimal,
    /// Enqueue sequence; equal-priority tasks dequeue in arrival order.
    seq: u64,
}

impl PartialEq for CopyTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for CopyTask {}

impl PartialOrd for CopyTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CopyTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// In-memory priority queue between the listener and the processor.
///
/// Push is non-blocking so the leader's own order path never waits on
/// follower fan-out.
#[derive(Default)]
pub struct CopyTradeQueue {
    heap: Mutex<BinaryHeap<CopyTask>>,
    seq: AtomicU64,
}

impl CopyTradeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, leader_trade_id: u64, trade: LeaderTrade) {
        let priority = trade.price * trade.amount;
        let task = CopyTask {
            leader_trade_id,
            trade,
            priority,
            seq: self.seq.fetch_add(1, AtomicOrdering::SeqCst),
        };
        self.heap.lock().push(task);
    }

    pub fn pop(&self) -> Option<CopyTask> {
        self.heap.lock().pop()
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }
}

/// Shared handle to the queue.
pub type SharedCopyQueue = Arc<CopyTradeQueue>;

pub fn create_copy_queue() -> SharedCopyQueue {
    Arc::new(CopyTradeQueue::new())
}
