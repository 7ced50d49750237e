//! Copy-trading records: followers, allocations, and replicated trades.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::Side;

/// How a follower's copy size is derived from the leader's order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyMode {
    /// Scale by the follower's allocation relative to the leader's balance.
    Proportional,
    /// Spend a fixed quote amount per leader trade.
    FixedAmount,
    /// Copy a fixed fraction of the leader's amount.
    FixedRatio,
}

/// Lifecycle status of a follower subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowerStatus {
    Active,
    Paused,
    Terminated,
}

/// A follower subscribed to a leader's trades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follower {
    pub follower_id: u64,
    pub leader_id: u64,
    pub copy_mode: CopyMode,
    /// Multiplier applied to the computed copy size (risk appetite).
    pub risk_multiplier: Decimal,
    /// Fixed quote amount for `CopyMode::FixedAmount`.
    pub fixed_amount: Decimal,
    /// Fraction of the leader's size for `CopyMode::FixedRatio`.
    pub fixed_ratio: Decimal,
    /// Cap on any single copied position, in quote currency.
    pub max_position_size: Decimal,
    /// Daily loss ceiling; replication stops for the day once reached.
    pub max_daily_loss: Decimal,
    pub status: FollowerStatus,
}

impl Follower {
    pub fn is_active(&self) -> bool {
        self.status == FollowerStatus::Active
    }
}

/// Per-(follower, symbol) capital allocation.
///
/// Invariant: `quote_used_amount <= quote_amount` and
/// `base_used_amount <= base_amount`, enforced under a locked
/// read-modify-write in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub follower_id: u64,
    pub symbol: String,
    pub quote_amount: Decimal,
    pub quote_used_amount: Decimal,
    pub base_amount: Decimal,
    pub base_used_amount: Decimal,
}

impl Allocation {
    pub fn available_quote(&self) -> Decimal {
        self.quote_amount - self.quote_used_amount
    }

    pub fn available_base(&self) -> Decimal {
        self.base_amount - self.base_used_amount
    }
}

/// Status of a replicated trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyTradeStatus {
    Pending,
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Closed,
    Failed,
}

impl CopyTradeStatus {
    /// Statuses that will never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Closed | Self::Failed)
    }
}

/// A leader's order intercepted for replication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderTrade {
    pub leader_id: u64,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
    pub created_at_ms: i64,
}

/// One follower's replicated trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyTrade {
    pub copy_trade_id: u64,
    pub follower_id: u64,
    pub leader_id: u64,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
    pub status: CopyTradeStatus,
    pub created_at_ms: i64,
}
