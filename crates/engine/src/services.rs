//! Dependency bundle wired by the composition root.

use std::sync::Arc;

use metrics::SharedMetrics;
use pool_core::SharedPoolManager;
use store_core::{
    CachedPriceFeed, ExchangeBook, HistoryStore, KvCache, MarketStore, OrderStore,
};
use strategy_core::SharedStrategyManager;

use crate::risk::SharedRiskManager;
use crate::settings::SharedSettings;

/// Every collaborator the engine needs, injected at construction.
///
/// All handles are cheap to clone; the binary builds one bundle and hands
/// clones to the engine and the copy-trade pipeline.
#[derive(Clone)]
pub struct EngineServices {
    pub market_store: Arc<dyn MarketStore>,
    pub order_store: Arc<dyn OrderStore>,
    pub book: Arc<dyn ExchangeBook>,
    pub history: Arc<dyn HistoryStore>,
    pub cache: Arc<dyn KvCache>,
    pub pool_manager: SharedPoolManager,
    pub price_feed: Arc<CachedPriceFeed>,
    pub settings: SharedSettings,
    pub strategies: SharedStrategyManager,
    pub risk: SharedRiskManager,
    pub metrics: SharedMetrics,
}
