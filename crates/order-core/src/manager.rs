//! Per-market order lifecycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use model::{OrderRecord, Side};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use store_core::{ExchangeBook, OrderStore, PlaceOrderRequest};
use tracing::{debug, warn};

use crate::error::OrderError;
use crate::stats::OrderStats;

/// AI-only orders resolve via internal matching, so they expire quickly.
const AI_ORDER_TTL_MS: i64 = 5 * 60 * 1000;
/// Real-liquidity orders wait on external counterparties.
const REAL_ORDER_TTL_MS: i64 = 60 * 60 * 1000;

/// Tracks one market's open orders and drives their lifecycle.
///
/// Orders are kept in insertion order so AI-to-AI matching is deterministic.
pub struct OrderManager {
    market_maker_id: u64,
    bot_id: u64,
    symbol: String,
    order_store: Arc<dyn OrderStore>,
    book: Arc<dyn ExchangeBook>,
    orders: RwLock<Vec<OrderRecord>>,
    /// Id source for AI-only orders; market-scoped so ids never collide with
    /// the book's counter or another market's range.
    next_ai_order_id: AtomicU64,
    stats: OrderStats,
}

impl OrderManager {
    pub fn new(
        market_maker_id: u64,
        bot_id: u64,
        symbol: impl Into<String>,
        order_store: Arc<dyn OrderStore>,
        book: Arc<dyn ExchangeBook>,
    ) -> Self {
        Self {
            market_maker_id,
            bot_id,
            symbol: symbol.into(),
            order_store,
            book,
            orders: RwLock::new(Vec::new()),
            next_ai_order_id: AtomicU64::new((market_maker_id << 32) | 1),
            stats: OrderStats::new(),
        }
    }

    /// Place an order.
    ///
    /// AI-only orders are persisted and tracked with the short expiration.
    /// Real-liquidity orders are additionally placed into the ecosystem book
    /// (tagged with the market-maker and bot ids) with the long expiration.
    pub async fn create_order(
        &self,
        side: Side,
        price: Decimal,
        amount: Decimal,
        is_real_liquidity: bool,
        now_ms: i64,
    ) -> Result<OrderRecord, OrderError> {
        let (order_id, ttl_ms) = if is_real_liquidity {
            let book_id = self
                .book
                .place_order(&PlaceOrderRequest {
                    market_maker_id: self.market_maker_id,
                    bot_id: self.bot_id,
                    symbol: self.symbol.clone(),
                    side,
                    price,
                    amount,
                })
                .await?;
            (book_id, REAL_ORDER_TTL_MS)
        } else {
            (
                self.next_ai_order_id.fetch_add(1, Ordering::SeqCst),
                AI_ORDER_TTL_MS,
            )
        };

        let order = OrderRecord {
            order_id,
            market_maker_id: self.market_maker_id,
            bot_id: self.bot_id,
            side,
            price,
            amount,
            filled_amount: Decimal::ZERO,
            is_real_liquidity,
            created_at_ms: now_ms,
            expires_at_ms: now_ms + ttl_ms,
        };

        if let Err(error) = self.order_store.insert_order(&order).await {
            // A book order without a persisted record is unaccounted for;
            // pull it back out before surfacing the failure.
            if is_real_liquidity {
                if let Err(cancel_error) = self
                    .book
                    .cancel_order(&self.symbol, order_id, side, price, amount)
                    .await
                {
                    warn!(order_id, %cancel_error, "failed to unwind book order");
                }
            }
            return Err(error.into());
        }

        self.orders.write().push(order.clone());
        self.stats.inc_created();
        debug!(
            order_id,
            side = ?side,
            %price,
            %amount,
            is_real_liquidity,
            "order created"
        );
        Ok(order)
    }

    /// Cancel a tracked order, unwinding the book entry for real liquidity.
    pub async fn cancel_order(&self, order_id: u64) -> Result<(), OrderError> {
        let order = self
            .find(order_id)
            .ok_or(OrderError::NotFound { order_id })?;

        if order.is_real_liquidity {
            self.book
                .cancel_order(
                    &self.symbol,
                    order.order_id,
                    order.side,
                    order.price,
                    order.remaining(),
                )
                .await?;
        }
        self.order_store.cancel_order(order.order_id).await?;

        self.remove(order_id);
        self.stats.inc_cancelled();
        Ok(())
    }

    /// Cancel every order past its expiration; returns how many were swept.
    pub async fn cleanup_expired_orders(&self, now_ms: i64) -> usize {
        let expired: Vec<u64> = self
            .orders
            .read()
            .iter()
            .filter(|o| o.is_expired(now_ms))
            .map(|o| o.order_id)
            .collect();

        let mut swept = 0;
        for order_id in expired {
            match self.cancel_order(order_id).await {
                Ok(()) => {
                    self.stats.inc_expired();
                    swept += 1;
                }
                Err(error) => warn!(order_id, %error, "expired order cleanup failed"),
            }
        }
        swept
    }

    /// Greedy AI-to-AI matching scan.
    ///
    /// Walks non-real open orders on the opposite side in insertion order,
    /// taking every order whose price crosses the requested price, until the
    /// requested amount is covered or candidates run out.
    pub fn find_matching_orders(
        &self,
        side: Side,
        price: Decimal,
        amount: Decimal,
    ) -> Vec<OrderRecord> {
        let orders = self.orders.read();
        let mut matched = Vec::new();
        let mut covered = Decimal::ZERO;

        for order in orders.iter() {
            if covered >= amount {
                break;
            }
            if order.is_real_liquidity || order.side != side.opposite() {
                continue;
            }
            let crosses = match side {
                Side::Buy => order.price <= price,
                Side::Sell => order.price >= price,
            };
            if !crosses || order.remaining().is_zero() {
                continue;
            }
            covered += order.remaining();
            matched.push(order.clone());
        }
        matched
    }

    /// Record a fill; a fully filled order leaves tracking.
    pub async fn update_order_fill(
        &self,
        order_id: u64,
        filled_amount: Decimal,
    ) -> Result<(), OrderError> {
        let order = self
            .find(order_id)
            .ok_or(OrderError::NotFound { order_id })?;

        self.order_store.update_fill(order_id, filled_amount).await?;

        if filled_amount >= order.amount {
            self.remove(order_id);
            self.stats.inc_filled();
        } else {
            let mut orders = self.orders.write();
            if let Some(tracked) = orders.iter_mut().find(|o| o.order_id == order_id) {
                tracked.filled_amount = filled_amount;
            }
        }
        Ok(())
    }

    pub fn open_orders(&self) -> Vec<OrderRecord> {
        self.orders.read().clone()
    }

    pub fn open_order_count(&self) -> usize {
        self.orders.read().len()
    }

    pub fn stats(&self) -> &OrderStats {
        &self.stats
    }

    fn find(&self, order_id: u64) -> Option<OrderRecord> {
        self.orders
            .read()
            .iter()
            .find(|o| o.order_id == order_id)
            .cloned()
    }

    fn remove(&self, order_id: u64) {
        self.orders.write().retain(|o| o.order_id != order_id);
    }
}
