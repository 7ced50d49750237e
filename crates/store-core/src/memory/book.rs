//! In-memory ecosystem order book.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use model::Side;
use rust_decimal::Decimal;

use crate::book::{ExchangeBook, PlaceOrderRequest};
use crate::error::{StoreError, StoreResult};

/// Resting-order book keyed by assigned order id.
///
/// Matching is not simulated; orders rest until cancelled. Best bid/ask are
/// derived from resting orders.
#[derive(Default)]
pub struct MemoryExchangeBook {
    orders: DashMap<u64, PlaceOrderRequest>,
    next_id: AtomicU64,
}

impl MemoryExchangeBook {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn open_order_count(&self) -> usize {
        self.orders.len()
    }
}

#[async_trait]
impl ExchangeBook for MemoryExchangeBook {
    async fn place_order(&self, request: &PlaceOrderRequest) -> StoreResult<u64> {
        let order_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.orders.insert(order_id, request.clone());
        Ok(order_id)
    }

    async fn cancel_order(
        &self,
        _symbol: &str,
        order_id: u64,
        _side: Side,
        _price: Decimal,
        _remaining: Decimal,
    ) -> StoreResult<()> {
        match self.orders.remove(&order_id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(format!("book order {}", order_id))),
        }
    }

    async fn best_bid(&self, symbol: &str) -> StoreResult<Option<Decimal>> {
        Ok(self
            .orders
            .iter()
            .filter(|o| o.symbol == symbol && o.side == Side::Buy)
            .map(|o| o.price)
            .max())
    }

    async fn best_ask(&self, symbol: &str) -> StoreResult<Option<Decimal>> {
        Ok(self
            .orders
            .iter()
            .filter(|o| o.symbol == symbol && o.side == Side::Sell)
            .map(|o| o.price)
            .min())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_request(side: Side, price: Decimal) -> PlaceOrderRequest {
        PlaceOrderRequest {
            market_maker_id: 1,
            bot_id: 10,
            symbol: "BTC/USDT".to_string(),
            side,
            price,
            amount: dec!(1),
        }
    }

    #[tokio::test]
    async fn test_place_and_cancel() {
        let book = MemoryExchangeBook::new();
        let id = book.place_order(&make_request(Side::Buy, dec!(100))).await.unwrap();
        assert_eq!(book.open_order_count(), 1);

        book.cancel_order("BTC/USDT", id, Side::Buy, dec!(100), dec!(1))
            .await
            .unwrap();
        assert_eq!(book.open_order_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_unknown_is_not_found() {
        let book = MemoryExchangeBook::new();
        let result = book
            .cancel_order("BTC/USDT", 42, Side::Buy, dec!(100), dec!(1))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_best_bid_ask() {
        let book = MemoryExchangeBook::new();
        book.place_order(&make_request(Side::Buy, dec!(99))).await.unwrap();
        book.place_order(&make_request(Side::Buy, dec!(100))).await.unwrap();
        book.place_order(&make_request(Side::Sell, dec!(101))).await.unwrap();
        book.place_order(&make_request(Side::Sell, dec!(102))).await.unwrap();

        assert_eq!(book.best_bid("BTC/USDT").await.unwrap(), Some(dec!(100)));
        assert_eq!(book.best_ask("BTC/USDT").await.unwrap(), Some(dec!(101)));
        assert_eq!(book.best_bid("ETH/USDT").await.unwrap(), None);
    }
}
