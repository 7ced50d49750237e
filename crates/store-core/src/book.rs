//! Shared ecosystem order book seam.

use async_trait::async_trait;
use model::Side;
use rust_decimal::Decimal;

use crate::error::StoreResult;

/// Request to place a real-liquidity order into the shared book.
#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    /// Market maker the order settles against.
    pub market_maker_id: u64,
    /// Bot identity tagged on the order for pool-based settlement.
    pub bot_id: u64,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
}

/// Order placement/cancellation and top-of-book queries against the shared
/// matching service.
#[async_trait]
pub trait ExchangeBook: Send + Sync {
    /// Place an order; returns the book-assigned order id.
    async fn place_order(&self, request: &PlaceOrderRequest) -> StoreResult<u64>;

    /// Cancel by the original side/price and the remaining amount.
    async fn cancel_order(
        &self,
        symbol: &str,
        order_id: u64,
        side: Side,
        price: Decimal,
        remaining: Decimal,
    ) -> StoreResult<()>;

    async fn best_bid(&self, symbol: &str) -> StoreResult<Option<Decimal>>;

    async fn best_ask(&self, symbol: &str) -> StoreResult<Option<Decimal>>;
}
