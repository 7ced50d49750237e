//! Simulator binary: wires the engine and the copy-trade pipeline against
//! the in-memory stores and runs until Ctrl+C.

use std::sync::Arc;
use std::time::Duration;

use copy_trade::{create_copy_queue, CopyConfig, CopyTradeProcessor, TradeListener};
use engine::{
    create_risk_manager, create_settings_cache, EngineConfig, EngineServices,
    MarketMakerEngine, RiskConfig,
};
use metrics::create_metrics;
use model::{
    Allocation, CopyMode, Follower, FollowerStatus, LeaderTrade, Market, MarketStatus,
    PoolBalances, Side,
};
use pool_core::create_pool_manager;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use store_core::memory::{
    MemoryCopyStore, MemoryExchangeBook, MemoryKvCache, MemoryPriceFeed, MemorySettings,
    MemoryStore,
};
use store_core::{CachedPriceFeed, PriceFeed};
use strategy_core::create_strategy_manager;
use tokio::sync::watch;
use tracing::{error, info};

/// Interval for periodic health status logging.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Interval at which the simulated leader places a trade.
const LEADER_TRADE_INTERVAL: Duration = Duration::from_secs(15);

fn make_market(id: u64, base: &str, quote: &str, target: Decimal) -> Market {
    Market {
        market_maker_id: id,
        bot_id: 9000 + id,
        base_currency: base.to_string(),
        quote_currency: quote.to_string(),
        target_price: target,
        status: MarketStatus::Active,
        real_liquidity_percent: dec!(20),
        current_daily_volume: Decimal::ZERO,
        volatility: dec!(0.02),
        volatility_threshold: dec!(0.05),
        price_range_min: target * dec!(0.9),
        price_range_max: target * dec!(1.1),
        aggressiveness: dec!(0.5),
        base_order_size: dec!(0.1),
    }
}

fn seed_demo_markets(store: &MemoryStore, feed: &MemoryPriceFeed) {
    let btc = make_market(1, "BTC", "USDT", dec!(50000));
    let eth = make_market(2, "ETH", "USDT", dec!(3000));
    feed.set_price(&btc.symbol(), dec!(49800));
    feed.set_price(&eth.symbol(), dec!(3020));
    store.seed_pool(1, PoolBalances::new(dec!(10), dec!(500000)));
    store.seed_pool(2, PoolBalances::new(dec!(100), dec!(300000)));
    store.seed_market(btc);
    store.seed_market(eth);
}

async fn seed_demo_followers(store: &MemoryCopyStore) {
    store
        .seed_follower(Follower {
            follower_id: 1,
            leader_id: 100,
            copy_mode: CopyMode::Proportional,
            risk_multiplier: dec!(0.5),
            fixed_amount: Decimal::ZERO,
            fixed_ratio: Decimal::ZERO,
            max_position_size: dec!(5000),
            max_daily_loss: dec!(2000),
            status: FollowerStatus::Active,
        })
        .await;
    store
        .seed_allocation(Allocation {
            follower_id: 1,
            symbol: "BTC/USDT".to_string(),
            quote_amount: dec!(10000),
            quote_used_amount: Decimal::ZERO,
            base_amount: dec!(0.2),
            base_used_amount: Decimal::ZERO,
        })
        .await;
    store.seed_wallet(1, "USDT", dec!(10000)).await;
    store.seed_wallet(1, "BTC", dec!(0.2)).await;
}

#[tokio::main]
async fn main() {
    common::init_logging();

    // Shadow mode keeps every order internal; live mode lets the engine
    // route its real-liquidity share into the shared book.
    let mode = common::ExecutionMode::from_env();
    info!(%mode, "starting simulator");

    let store = Arc::new(MemoryStore::new());
    let feed = Arc::new(MemoryPriceFeed::new());
    seed_demo_markets(&store, &feed);

    let settings_store = Arc::new(MemorySettings::new());
    settings_store.set("aiMarketMakerEnabled", "true");
    settings_store.set("stopLossEnabled", "true");
    settings_store.set("maxDailyLoss", "1000");
    settings_store.set("aiMarketMakerMaxConcurrentBots", "10");
    settings_store.set("minPoolLiquidity", "100");

    let metrics = create_metrics();
    let services = EngineServices {
        market_store: store.clone(),
        order_store: store.clone(),
        book: Arc::new(MemoryExchangeBook::new()),
        history: store.clone(),
        cache: Arc::new(MemoryKvCache::new()),
        pool_manager: create_pool_manager(store.clone(), store.clone()),
        price_feed: Arc::new(CachedPriceFeed::new(feed.clone())),
        settings: create_settings_cache(settings_store),
        strategies: create_strategy_manager(),
        risk: create_risk_manager(RiskConfig::default()),
        metrics: metrics.clone(),
    };

    let engine_config = EngineConfig::default().with_real_liquidity(mode.is_live());
    let engine = Arc::new(MarketMakerEngine::new(engine_config, services));
    if let Err(e) = engine.initialize().await {
        error!(error = %e, "engine failed to initialize");
        return;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Engine tick loop
    let engine_handle = tokio::spawn(engine.clone().run(shutdown_rx.clone()));

    // Copy-trade pipeline
    let copy_store = Arc::new(MemoryCopyStore::new());
    seed_demo_followers(&copy_store).await;
    let queue = create_copy_queue();
    let listener = Arc::new(TradeListener::new(copy_store.clone(), queue.clone()));
    let processor = Arc::new(CopyTradeProcessor::new(
        copy_store,
        queue,
        CopyConfig::default(),
        store.clone(),
        metrics.clone(),
    ));
    let processor_handle = tokio::spawn(processor.run(shutdown_rx.clone()));

    // Simulated leader placing trades against the feed price
    let leader_feed = feed.clone();
    let mut leader_shutdown_rx = shutdown_rx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LEADER_TRADE_INTERVAL);
        let mut side = Side::Buy;
        loop {
            tokio::select! {
                _ = leader_shutdown_rx.changed() => {
                    if *leader_shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    let price = match leader_feed.last_price("BTC/USDT").await {
                        Ok(Some(price)) => price,
                        _ => continue,
                    };
                    let trade = LeaderTrade {
                        leader_id: 100,
                        symbol: "BTC/USDT".to_string(),
                        side,
                        price,
                        amount: dec!(0.05),
                        created_at_ms: common::epoch_ms(),
                    };
                    side = side.opposite();
                    if let Err(e) = listener.on_order_created(trade).await {
                        error!(error = %e, "leader trade interception failed");
                    }
                }
            }
        }
    });

    // Ctrl+C flips the shutdown signal
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, initiating shutdown");
            let _ = shutdown_tx_clone.send(true);
        }
    });

    // Periodic health reporter
    let health_metrics = metrics.clone();
    let mut health_shutdown_rx = shutdown_rx;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEALTH_LOG_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let snapshot = health_metrics.snapshot();
                    info!(
                        status = %snapshot.health_status(),
                        ticks = snapshot.ticks_completed,
                        trades = snapshot.trades_executed,
                        trades_per_sec = format!("{:.1}", snapshot.trades_per_second),
                        orders = snapshot.orders_placed,
                        copies = snapshot.copy_trades_replicated,
                        errors = snapshot.tick_errors,
                        "health check"
                    );
                }
                _ = health_shutdown_rx.changed() => {
                    if *health_shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });

    let _ = engine_handle.await;
    let _ = processor_handle.await;

    println!("\n{}", metrics.snapshot());
    info!("shutdown complete");
}
