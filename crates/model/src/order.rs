//! Tracked order record.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::Side;

/// An open order tracked by a market's order manager.
///
/// Invariant: `filled_amount <= amount`. An order held in the open-order map
/// is OPEN or PARTIAL; terminal orders are removed from tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: u64,
    pub market_maker_id: u64,
    pub bot_id: u64,
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
    pub filled_amount: Decimal,
    /// True when the order was also placed into the shared order book.
    pub is_real_liquidity: bool,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
}

impl OrderRecord {
    /// Amount still unfilled.
    pub fn remaining(&self) -> Decimal {
        self.amount - self.filled_amount
    }

    /// Whether the order has passed its expiry.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_order() -> OrderRecord {
        OrderRecord {
            order_id: 1,
            market_maker_id: 1,
            bot_id: 10,
            side: Side::Buy,
            price: dec!(100),
            amount: dec!(5),
            filled_amount: dec!(2),
            is_real_liquidity: false,
            created_at_ms: 1_000,
            expires_at_ms: 301_000,
        }
    }

    #[test]
    fn test_remaining() {
        assert_eq!(make_order().remaining(), dec!(3));
    }

    #[test]
    fn test_expiry_boundary() {
        let order = make_order();
        assert!(!order.is_expired(300_999));
        assert!(order.is_expired(301_000));
    }
}
