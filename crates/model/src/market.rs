//! Market, engine, and trade record types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trade side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side a matching counter-order must have.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

/// Lifecycle status of the engine singleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

/// Persisted status of a market maker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStatus {
    Active,
    Paused,
    Stopped,
}

/// Overall risk classification, exposed for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// A market-maker record as persisted and loaded into the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    /// Identity of this market maker.
    pub market_maker_id: u64,
    /// Bot identity used when tagging real-liquidity orders.
    pub bot_id: u64,
    /// Base currency (e.g., "BTC").
    pub base_currency: String,
    /// Quote currency (e.g., "USDT").
    pub quote_currency: String,
    /// Price the maker steers toward.
    pub target_price: Decimal,
    /// Current lifecycle status.
    pub status: MarketStatus,
    /// Share of generated orders routed to the real order book (0-100).
    pub real_liquidity_percent: Decimal,
    /// Volume traded since the last daily reset (quote currency).
    pub current_daily_volume: Decimal,
    /// Annualized-style volatility reading for this market.
    pub volatility: Decimal,
    /// Volatility level above which trades are shrunk or rejected.
    pub volatility_threshold: Decimal,
    /// Lower bound of the allowed price band.
    pub price_range_min: Decimal,
    /// Upper bound of the allowed price band.
    pub price_range_max: Decimal,
    /// Trading aggressiveness in [0, 1]; scales strategy step sizes.
    pub aggressiveness: Decimal,
    /// Base order size in base currency.
    pub base_order_size: Decimal,
}

impl Market {
    /// Combined pair symbol, e.g. "BTC/USDT".
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.base_currency, self.quote_currency)
    }
}

/// A settled trade, persisted before balances are mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub market_maker_id: u64,
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
    pub fee: Decimal,
    /// Realized profit or loss attributed to this trade.
    pub pnl: Decimal,
    pub executed_at_ms: i64,
}

/// Kinds of audit events the engine records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryEventKind {
    MarketStarted,
    MarketStopped,
    MarketPaused,
    MarketResumed,
    EmergencyStop,
    CircuitBreakerTripped,
    DailyReset,
    CopyTradeExecuted,
    CopyTradeFailed,
}

/// Fire-and-forget audit record; never on the correctness path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Market this event concerns, if any.
    pub market_maker_id: Option<u64>,
    pub kind: HistoryEventKind,
    pub detail: String,
    pub timestamp_ms: i64,
}
