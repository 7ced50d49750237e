//! Pool-level P&L attribution.

use model::PoolBalances;
use parking_lot::RwLock;
use rust_decimal::Decimal;

/// P&L for one pool.
///
/// Unrealized P&L compares total value locked at the current price against
/// total value at the entry price. Plain balance deltas would misattribute
/// price-driven value changes as trading profit.
pub struct PnLCalculator {
    entry_price: RwLock<Decimal>,
    realized: RwLock<Decimal>,
}

impl PnLCalculator {
    pub fn new(entry_price: Decimal) -> Self {
        Self {
            entry_price: RwLock::new(entry_price),
            realized: RwLock::new(Decimal::ZERO),
        }
    }

    pub fn entry_price(&self) -> Decimal {
        *self.entry_price.read()
    }

    /// Reset the entry price (deposit/withdraw re-anchors attribution).
    pub fn reset_entry_price(&self, price: Decimal) {
        *self.entry_price.write() = price;
    }

    /// Unrealized P&L of the pool at the current price.
    pub fn unrealized(&self, balances: &PoolBalances, current_price: Decimal) -> Decimal {
        balances.total_value(current_price) - balances.total_value(self.entry_price())
    }

    /// Accumulate P&L; only realized amounts (trade closures) are kept.
    pub fn record_pnl(&self, amount: Decimal, is_realized: bool) {
        if is_realized {
            *self.realized.write() += amount;
        }
    }

    pub fn realized(&self) -> Decimal {
        *self.realized.read()
    }
}
