//! Live pool balance accounting.

use std::time::{Duration, Instant};

use model::{PoolBalances, Side, TradeRecord};
use parking_lot::RwLock;
use rust_decimal::Decimal;

/// How stale the persisted copy of a pool may get before a sync is due.
const SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Single source of truth for one pool's balances between store syncs.
///
/// Concurrent order placement is kept honest by the reserve/release protocol:
/// placing an order first reserves the funds it would consume, and `reserve`
/// fails closed when the available (unreserved) balance is insufficient.
pub struct BalanceTracker {
    market_maker_id: u64,
    balances: RwLock<PoolBalances>,
    last_synced: RwLock<Instant>,
}

impl BalanceTracker {
    pub fn new(market_maker_id: u64, initial: PoolBalances) -> Self {
        Self {
            market_maker_id,
            balances: RwLock::new(initial),
            last_synced: RwLock::new(Instant::now()),
        }
    }

    pub fn market_maker_id(&self) -> u64 {
        self.market_maker_id
    }

    pub fn balances(&self) -> PoolBalances {
        self.balances.read().clone()
    }

    /// Reserve the funds an order would consume.
    ///
    /// BUY reserves quote (`amount * price`), SELL reserves base (`amount`).
    /// Returns false without mutating anything if the available balance does
    /// not cover the reservation.
    pub fn reserve(&self, side: Side, amount: Decimal, price: Decimal) -> bool {
        let mut balances = self.balances.write();
        match side {
            Side::Buy => {
                let needed = amount * price;
                if balances.available_quote() < needed {
                    return false;
                }
                balances.reserved_quote += needed;
            }
            Side::Sell => {
                if balances.available_base() < amount {
                    return false;
                }
                balances.reserved_base += amount;
            }
        }
        true
    }

    /// Release a reservation (order cancelled or expired).
    pub fn release(&self, side: Side, amount: Decimal, price: Decimal) {
        let mut balances = self.balances.write();
        match side {
            Side::Buy => {
                balances.reserved_quote =
                    (balances.reserved_quote - amount * price).max(Decimal::ZERO);
            }
            Side::Sell => {
                balances.reserved_base = (balances.reserved_base - amount).max(Decimal::ZERO);
            }
        }
    }

    /// Apply a fill to the in-memory balances and release its reservation.
    ///
    /// BUY: base grows by the amount, quote shrinks by cost plus fee.
    /// SELL: the inverse, with the fee still paid from quote.
    pub fn apply_trade(&self, trade: &TradeRecord) {
        let mut balances = self.balances.write();
        let cost = trade.amount * trade.price;
        match trade.side {
            Side::Buy => {
                balances.base_currency_balance += trade.amount;
                balances.quote_currency_balance -= cost + trade.fee;
                balances.reserved_quote = (balances.reserved_quote - cost).max(Decimal::ZERO);
            }
            Side::Sell => {
                balances.base_currency_balance -= trade.amount;
                balances.quote_currency_balance += cost - trade.fee;
                balances.reserved_base =
                    (balances.reserved_base - trade.amount).max(Decimal::ZERO);
            }
        }
    }

    /// Overwrite the in-memory balances (deposit/withdraw/rebalance paths).
    pub fn set_balances(&self, balances: PoolBalances) {
        *self.balances.write() = balances;
    }

    /// Whether the persisted copy is older than the sync interval.
    pub fn needs_sync(&self) -> bool {
        self.last_synced.read().elapsed() >= SYNC_INTERVAL
    }

    pub fn mark_synced(&self) {
        *self.last_synced.write() = Instant::now();
    }
}
