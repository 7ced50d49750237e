//! One running market maker.
//!
//! `MarketInstance` owns everything a single market needs on a tick: the
//! latest price, its strategies' combined decision, the risk assessment, the
//! pool reservation, order placement, and internal AI-to-AI matching.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use metrics::SharedMetrics;
use model::{Market, MarketStatus, OrderRecord, Side, TradeRecord};
use order_core::OrderManager;
use parking_lot::RwLock;
use pool_core::{BalanceTracker, PnLCalculator, SharedPoolManager};
use rand::Rng;
use rust_decimal::Decimal;
use store_core::{CachedPriceFeed, ExchangeBook, MarketStore, OrderStore};
use strategy_core::{PriceGenerator, SharedStrategyManager, StrategyInput};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::risk::{SharedRiskManager, TradeAssessment};

pub struct MarketInstance {
    market: RwLock<Market>,
    current_price: RwLock<Decimal>,
    paused: AtomicBool,
    pool: Arc<BalanceTracker>,
    orders: OrderManager,
    pnl: PnLCalculator,
    price_generator: PriceGenerator,
    market_store: Arc<dyn MarketStore>,
    pool_manager: SharedPoolManager,
    price_feed: Arc<CachedPriceFeed>,
    strategies: SharedStrategyManager,
    risk: SharedRiskManager,
    metrics: SharedMetrics,
    enable_real_liquidity: bool,
}

#[allow(clippy::too_many_arguments)]
impl MarketInstance {
    pub fn new(
        market: Market,
        pool: Arc<BalanceTracker>,
        order_store: Arc<dyn OrderStore>,
        book: Arc<dyn ExchangeBook>,
        market_store: Arc<dyn MarketStore>,
        pool_manager: SharedPoolManager,
        price_feed: Arc<CachedPriceFeed>,
        strategies: SharedStrategyManager,
        risk: SharedRiskManager,
        metrics: SharedMetrics,
        enable_real_liquidity: bool,
    ) -> Self {
        let orders = OrderManager::new(
            market.market_maker_id,
            market.bot_id,
            market.symbol(),
            order_store,
            book,
        );
        let target_price = market.target_price;
        Self {
            current_price: RwLock::new(target_price),
            paused: AtomicBool::new(market.status == MarketStatus::Paused),
            pnl: PnLCalculator::new(target_price),
            market: RwLock::new(market),
            pool,
            orders,
            price_generator: PriceGenerator::new(),
            market_store,
            pool_manager,
            price_feed,
            strategies,
            risk,
            metrics,
            enable_real_liquidity,
        }
    }

    pub fn market_maker_id(&self) -> u64 {
        self.market.read().market_maker_id
    }

    pub fn symbol(&self) -> String {
        self.market.read().symbol()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn current_price(&self) -> Decimal {
        *self.current_price.read()
    }

    pub fn orders(&self) -> &OrderManager {
        &self.orders
    }

    pub fn pool(&self) -> &BalanceTracker {
        &self.pool
    }

    /// Anchor the price and P&L attribution to the live feed.
    pub async fn initialize(&self) {
        let symbol = self.symbol();
        if let Some(price) = self.price_feed.last_price(&symbol).await {
            *self.current_price.write() = price;
            self.pnl.reset_entry_price(price);
        }
    }

    /// One trading tick for this market.
    pub async fn process_tick(&self) -> Result<(), EngineError> {
        if self.is_paused() {
            return Ok(());
        }

        let market = self.market.read().clone();
        let symbol = market.symbol();
        let price = match self.price_feed.last_price(&symbol).await {
            Some(price) => price,
            None => *self.current_price.read(),
        };
        if price <= Decimal::ZERO {
            debug!(symbol = %symbol, "no usable price, skipping tick");
            return Ok(());
        }
        *self.current_price.write() = price;

        let input = StrategyInput {
            current_price: price,
            target_price: market.target_price,
            volatility: market.volatility,
            volatility_threshold: market.volatility_threshold,
            aggressiveness: market.aggressiveness,
            price_range_min: market.price_range_min,
            price_range_max: market.price_range_max,
            phase_elapsed_ms: 0,
        };
        if self
            .strategies
            .strategies_for(market.market_maker_id)
            .is_empty()
        {
            self.strategies.auto_select(market.market_maker_id, &input);
        }
        let Some(decision) = self.strategies.calculate(market.market_maker_id, input) else {
            return Ok(());
        };

        let requested = market.base_order_size * decision.size_multiplier;
        let pool_value = self.pool.balances().total_value(price);
        let amount = match self.risk.assess_trade_risk(&market, requested, pool_value) {
            TradeAssessment::Approved { amount } => amount,
            TradeAssessment::Rejected(reason) => {
                debug!(
                    market_maker_id = market.market_maker_id,
                    %reason,
                    "trade rejected by risk"
                );
                return Ok(());
            }
        };
        if amount <= Decimal::ZERO {
            return Ok(());
        }

        let raw_price = (price * (Decimal::ONE + decision.price_adjustment))
            .clamp(market.price_range_min, market.price_range_max);
        let limit_price = self
            .price_generator
            .generate(decision.direction, raw_price, None);

        let is_real = self.enable_real_liquidity
            && Decimal::from(rand::thread_rng().gen_range(0u32..100))
                < market.real_liquidity_percent;

        if !self.pool.reserve(decision.direction, amount, limit_price) {
            debug!(
                market_maker_id = market.market_maker_id,
                side = ?decision.direction,
                %amount,
                "insufficient available balance, order skipped"
            );
            return Ok(());
        }

        let now_ms = common::epoch_ms();
        let order = match self
            .orders
            .create_order(decision.direction, limit_price, amount, is_real, now_ms)
            .await
        {
            Ok(order) => order,
            Err(error) => {
                self.pool.release(decision.direction, amount, limit_price);
                return Err(error.into());
            }
        };
        self.metrics.inc_orders_placed();
        debug!(
            market_maker_id = market.market_maker_id,
            order_id = order.order_id,
            reason = %decision.reason,
            "order placed"
        );

        if !order.is_real_liquidity {
            self.match_internal(&order).await?;
        }
        Ok(())
    }

    /// Fill the new order against crossing AI orders already on this market.
    ///
    /// Each fill settles both legs through the pool (a wash trade nets to the
    /// fees), attributes realized P&L to the sell leg, and feeds the result
    /// into the risk streak tracking.
    async fn match_internal(&self, order: &OrderRecord) -> Result<(), EngineError> {
        let candidates =
            self.orders
                .find_matching_orders(order.side, order.price, order.remaining());
        if candidates.is_empty() {
            return Ok(());
        }

        let market_maker_id = order.market_maker_id;
        let now_ms = common::epoch_ms();
        let mut remaining = order.remaining();
        let mut taker_filled = order.filled_amount;
        let mut volume = Decimal::ZERO;

        for counter in candidates {
            if remaining <= Decimal::ZERO {
                break;
            }
            let fill = remaining.min(counter.remaining());
            // Execution happens at the resting order's price.
            let exec_price = counter.price;

            let sell_pnl = (exec_price - self.pnl.entry_price()) * fill;
            let (taker_pnl, maker_pnl) = match order.side {
                Side::Sell => (sell_pnl, Decimal::ZERO),
                Side::Buy => (Decimal::ZERO, sell_pnl),
            };

            let taker_trade = TradeRecord {
                market_maker_id,
                side: order.side,
                price: exec_price,
                amount: fill,
                fee: Decimal::ZERO,
                pnl: taker_pnl,
                executed_at_ms: now_ms,
            };
            let maker_trade = TradeRecord {
                side: order.side.opposite(),
                pnl: maker_pnl,
                ..taker_trade.clone()
            };
            self.pool_manager.settle_trade(&taker_trade).await?;
            self.pool_manager.settle_trade(&maker_trade).await?;

            // A buy taker reserved at its limit price but filled cheaper;
            // hand the difference back.
            if order.side == Side::Buy && order.price > exec_price {
                self.pool.release(Side::Buy, fill, order.price - exec_price);
            }

            self.pnl.record_pnl(sell_pnl, true);
            self.risk.report_trade_result(market_maker_id, sell_pnl);
            self.metrics.inc_trades_executed();

            self.orders
                .update_order_fill(counter.order_id, counter.filled_amount + fill)
                .await?;

            taker_filled += fill;
            remaining -= fill;
            volume += fill * exec_price;
        }

        self.orders
            .update_order_fill(order.order_id, taker_filled)
            .await?;

        if volume > Decimal::ZERO {
            let new_volume = {
                let mut market = self.market.write();
                market.current_daily_volume += volume;
                market.current_daily_volume
            };
            if let Err(error) = self
                .market_store
                .update_daily_volume(market_maker_id, new_volume)
                .await
            {
                warn!(market_maker_id, %error, "daily volume update failed");
            }
        }
        Ok(())
    }

    /// Cancel every open order, releasing its pool reservation.
    pub async fn cancel_all_orders(&self) {
        for order in self.orders.open_orders() {
            match self.orders.cancel_order(order.order_id).await {
                Ok(()) => {
                    self.pool
                        .release(order.side, order.remaining(), order.price);
                    self.metrics.inc_orders_cancelled();
                }
                Err(error) => {
                    warn!(order_id = order.order_id, %error, "cancel failed during teardown")
                }
            }
        }
    }

    /// Graceful stop: cancel orders and persist the STOPPED status.
    pub async fn stop(&self) -> Result<(), EngineError> {
        self.cancel_all_orders().await;
        let market_maker_id = {
            let mut market = self.market.write();
            market.status = MarketStatus::Stopped;
            market.market_maker_id
        };
        self.market_store
            .update_market_status(market_maker_id, MarketStatus::Stopped)
            .await?;
        info!(market_maker_id, "market stopped");
        Ok(())
    }

    /// Emergency teardown: never fails, status persistence is the caller's
    /// bulk update.
    pub async fn force_stop(&self) {
        self.paused.store(true, Ordering::SeqCst);
        self.cancel_all_orders().await;
        self.market.write().status = MarketStatus::Stopped;
    }

    pub async fn pause(&self) -> Result<(), EngineError> {
        self.paused.store(true, Ordering::SeqCst);
        self.cancel_all_orders().await;
        let market_maker_id = {
            let mut market = self.market.write();
            market.status = MarketStatus::Paused;
            market.market_maker_id
        };
        self.market_store
            .update_market_status(market_maker_id, MarketStatus::Paused)
            .await?;
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), EngineError> {
        let market_maker_id = {
            let mut market = self.market.write();
            market.status = MarketStatus::Active;
            market.market_maker_id
        };
        self.market_store
            .update_market_status(market_maker_id, MarketStatus::Active)
            .await?;
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// UTC-midnight reset: daily volume back to zero, P&L re-anchored.
    pub async fn daily_reset(&self) {
        let market_maker_id = {
            let mut market = self.market.write();
            market.current_daily_volume = Decimal::ZERO;
            market.market_maker_id
        };
        if let Err(error) = self
            .market_store
            .update_daily_volume(market_maker_id, Decimal::ZERO)
            .await
        {
            warn!(market_maker_id, %error, "daily volume reset failed");
        }
        self.pnl.reset_entry_price(*self.current_price.read());
    }

    /// Sweep expired orders, releasing their reservations.
    pub async fn cleanup_expired_orders(&self, now_ms: i64) -> usize {
        let expired: Vec<OrderRecord> = self
            .orders
            .open_orders()
            .into_iter()
            .filter(|o| o.is_expired(now_ms))
            .collect();

        let mut swept = 0;
        for order in expired {
            match self.orders.cancel_order(order.order_id).await {
                Ok(()) => {
                    self.pool
                        .release(order.side, order.remaining(), order.price);
                    self.orders.stats().inc_expired();
                    swept += 1;
                }
                Err(error) => {
                    warn!(order_id = order.order_id, %error, "expired order sweep failed")
                }
            }
        }
        swept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskConfig;
    use crate::risk::{create_risk_manager, RiskManager};
    use model::PoolBalances;
    use pool_core::create_pool_manager;
    use rust_decimal_macros::dec;
    use store_core::memory::{MemoryExchangeBook, MemoryPriceFeed, MemoryStore};
    use store_core::PriceFeed;
    use strategy_core::create_strategy_manager;

    struct Fixture {
        store: Arc<MemoryStore>,
        risk: Arc<RiskManager>,
        instance: MarketInstance,
    }

    fn make_market(id: u64, target: Decimal) -> Market {
        Market {
            market_maker_id: id,
            bot_id: id + 100,
            base_currency: "BTC".to_string(),
            quote_currency: "USDT".to_string(),
            target_price: target,
            status: MarketStatus::Active,
            real_liquidity_percent: dec!(0),
            current_daily_volume: dec!(0),
            volatility: dec!(2),
            volatility_threshold: dec!(10),
            price_range_min: dec!(50),
            price_range_max: dec!(200),
            aggressiveness: dec!(0.5),
            base_order_size: dec!(1),
        }
    }

    async fn make_fixture(market: Market) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        store.seed_market(market.clone());
        store.seed_pool(market.market_maker_id, PoolBalances::new(dec!(100), dec!(100000)));

        let feed = Arc::new(MemoryPriceFeed::new());
        feed.set_price(&market.symbol(), dec!(100));

        let pool_manager = create_pool_manager(store.clone(), store.clone());
        let pool = pool_manager.load_pool(market.market_maker_id).await.unwrap();
        let risk = create_risk_manager(RiskConfig::default());
        let instance = MarketInstance::new(
            market,
            pool,
            store.clone(),
            Arc::new(MemoryExchangeBook::new()),
            store.clone(),
            pool_manager,
            Arc::new(CachedPriceFeed::new(feed.clone() as Arc<dyn PriceFeed>)),
            create_strategy_manager(),
            risk.clone(),
            metrics::create_metrics(),
            false,
        );
        instance.initialize().await;
        Fixture {
            store,
            risk,
            instance,
        }
    }

    #[tokio::test]
    async fn test_tick_places_order_when_off_target() {
        // Price 100, target 110: drift strategy always wants to buy
        let fixture = make_fixture(make_market(1, dec!(110))).await;
        fixture.instance.process_tick().await.unwrap();

        assert_eq!(fixture.instance.orders().open_order_count(), 1);
        let order = &fixture.instance.orders().open_orders()[0];
        assert_eq!(order.side, Side::Buy);
        assert!(!order.is_real_liquidity);
        // The reservation backs the order
        assert!(fixture.instance.pool().balances().reserved_quote > Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_disabled_real_liquidity_keeps_orders_internal() {
        // Even at 100% real-liquidity share, a shadow-mode engine never
        // routes to the shared book.
        let mut market = make_market(1, dec!(110));
        market.real_liquidity_percent = dec!(100);
        let fixture = make_fixture(market).await;
        fixture.instance.process_tick().await.unwrap();

        let orders = fixture.instance.orders().open_orders();
        assert_eq!(orders.len(), 1);
        assert!(!orders[0].is_real_liquidity);
    }

    #[tokio::test]
    async fn test_paused_market_does_nothing() {
        let fixture = make_fixture(make_market(1, dec!(110))).await;
        fixture.instance.pause().await.unwrap();
        fixture.instance.process_tick().await.unwrap();

        assert_eq!(fixture.instance.orders().open_order_count(), 0);
        assert_eq!(fixture.store.market_status(1), Some(MarketStatus::Paused));
    }

    #[tokio::test]
    async fn test_resume_restores_trading() {
        let fixture = make_fixture(make_market(1, dec!(110))).await;
        fixture.instance.pause().await.unwrap();
        fixture.instance.resume().await.unwrap();
        fixture.instance.process_tick().await.unwrap();

        assert_eq!(fixture.instance.orders().open_order_count(), 1);
    }

    #[tokio::test]
    async fn test_tick_rejected_by_volatility() {
        let mut market = make_market(1, dec!(110));
        market.volatility = dec!(25); // over 2x the threshold of 10
        let fixture = make_fixture(market).await;
        fixture.instance.process_tick().await.unwrap();

        assert_eq!(fixture.instance.orders().open_order_count(), 0);
    }

    #[tokio::test]
    async fn test_internal_match_settles_both_legs() {
        let fixture = make_fixture(make_market(1, dec!(110))).await;

        // A resting sell far below any generated buy price
        fixture.instance.pool().reserve(Side::Sell, dec!(5), dec!(60));
        fixture
            .instance
            .orders()
            .create_order(Side::Sell, dec!(60), dec!(5), false, common::epoch_ms())
            .await
            .unwrap();

        fixture.instance.process_tick().await.unwrap();

        // Buy order crossed the resting sell: two trade legs persisted
        assert_eq!(fixture.store.trade_count(), 2);
        // Daily volume reflects the fill at the resting price
        let market = fixture.store.get_market(1).await.unwrap().unwrap();
        assert!(market.current_daily_volume > Decimal::ZERO);
        // The wash nets to zero value change (no fees in tests)
        let balances = fixture.instance.pool().balances();
        assert_eq!(balances.base_currency_balance, dec!(100));
        assert_eq!(balances.quote_currency_balance, dec!(100000));
    }

    #[tokio::test]
    async fn test_sell_leg_pnl_feeds_risk() {
        let fixture = make_fixture(make_market(1, dec!(110))).await;
        // Entry anchored at 100; the resting sell at 60 realizes a loss
        fixture.instance.pool().reserve(Side::Sell, dec!(5), dec!(60));
        fixture
            .instance
            .orders()
            .create_order(Side::Sell, dec!(60), dec!(5), false, common::epoch_ms())
            .await
            .unwrap();
        fixture.instance.process_tick().await.unwrap();

        assert!(fixture.risk.market_daily_pnl(1) < Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_stop_cancels_and_releases() {
        let fixture = make_fixture(make_market(1, dec!(110))).await;
        fixture.instance.process_tick().await.unwrap();
        assert!(fixture.instance.orders().open_order_count() > 0);

        fixture.instance.stop().await.unwrap();
        assert_eq!(fixture.instance.orders().open_order_count(), 0);
        assert_eq!(fixture.instance.pool().balances().reserved_quote, dec!(0));
        assert_eq!(fixture.store.market_status(1), Some(MarketStatus::Stopped));
    }

    #[tokio::test]
    async fn test_expired_sweep_releases_reservation() {
        let fixture = make_fixture(make_market(1, dec!(110))).await;
        fixture.instance.pool().reserve(Side::Buy, dec!(1), dec!(100));
        fixture
            .instance
            .orders()
            .create_order(Side::Buy, dec!(100), dec!(1), false, 0)
            .await
            .unwrap();

        let swept = fixture
            .instance
            .cleanup_expired_orders(10 * 60 * 1000)
            .await;
        assert_eq!(swept, 1);
        assert_eq!(fixture.instance.pool().balances().reserved_quote, dec!(0));
    }

    #[tokio::test]
    async fn test_daily_reset_zeroes_volume() {
        let fixture = make_fixture(make_market(1, dec!(110))).await;
        fixture.instance.pool().reserve(Side::Sell, dec!(5), dec!(60));
        fixture
            .instance
            .orders()
            .create_order(Side::Sell, dec!(60), dec!(5), false, common::epoch_ms())
            .await
            .unwrap();
        fixture.instance.process_tick().await.unwrap();

        fixture.instance.daily_reset().await;
        let market = fixture.store.get_market(1).await.unwrap().unwrap();
        assert_eq!(market.current_daily_volume, dec!(0));
    }
}
