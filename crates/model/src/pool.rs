//! Pool balance record.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balances backing one market maker's pool.
///
/// Invariant: `reserved_base <= base_currency_balance` and
/// `reserved_quote <= quote_currency_balance` at all times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolBalances {
    pub base_currency_balance: Decimal,
    pub quote_currency_balance: Decimal,
    pub reserved_base: Decimal,
    pub reserved_quote: Decimal,
    /// Balances at pool creation, used for P&L attribution and rebalancing.
    pub initial_base: Decimal,
    pub initial_quote: Decimal,
}

impl PoolBalances {
    pub fn new(initial_base: Decimal, initial_quote: Decimal) -> Self {
        Self {
            base_currency_balance: initial_base,
            quote_currency_balance: initial_quote,
            reserved_base: Decimal::ZERO,
            reserved_quote: Decimal::ZERO,
            initial_base,
            initial_quote,
        }
    }

    /// Base currency not committed to open orders.
    pub fn available_base(&self) -> Decimal {
        self.base_currency_balance - self.reserved_base
    }

    /// Quote currency not committed to open orders.
    pub fn available_quote(&self) -> Decimal {
        self.quote_currency_balance - self.reserved_quote
    }

    /// Total value locked at the given price, in quote currency.
    pub fn total_value(&self, price: Decimal) -> Decimal {
        self.base_currency_balance * price + self.quote_currency_balance
    }
}
