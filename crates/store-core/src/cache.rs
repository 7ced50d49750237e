//! Key-value cache, settings store, and price feed seams.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::error::StoreResult;

/// Ephemeral key-value cache with TTL semantics.
///
/// Best-effort: callers swallow errors (`.ok()`); a cache outage degrades
/// freshness, never correctness.
#[async_trait]
pub trait KvCache: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;
}

/// Named-key settings lookup (admin-managed global configuration).
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
}

/// External exchange last-traded price.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Last traded price for a symbol, or `None` when the feed has no data.
    async fn last_price(&self, symbol: &str) -> StoreResult<Option<Decimal>>;
}

/// Price feed wrapper caching each symbol for a short window.
///
/// Feed failures are tolerated: the wrapper returns `None` and callers skip
/// whatever check needed the price.
pub struct CachedPriceFeed {
    inner: Arc<dyn PriceFeed>,
    ttl: Duration,
    cache: RwLock<HashMap<String, (Instant, Decimal)>>,
}

impl CachedPriceFeed {
    const DEFAULT_TTL: Duration = Duration::from_secs(10);

    pub fn new(inner: Arc<dyn PriceFeed>) -> Self {
        Self::with_ttl(inner, Self::DEFAULT_TTL)
    }

    pub fn with_ttl(inner: Arc<dyn PriceFeed>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Cached last price, refreshing entries older than the TTL.
    pub async fn last_price(&self, symbol: &str) -> Option<Decimal> {
        if let Some((fetched_at, price)) = self.cache.read().get(symbol) {
            if fetched_at.elapsed() < self.ttl {
                return Some(*price);
            }
        }

        match self.inner.last_price(symbol).await {
            Ok(Some(price)) => {
                self.cache
                    .write()
                    .insert(symbol.to_string(), (Instant::now(), price));
                Some(price)
            }
            Ok(None) => None,
            Err(e) => {
                debug!(symbol = %symbol, error = %e, "price feed unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    struct CountingFeed {
        price: Mutex<Option<Decimal>>,
        calls: Mutex<u32>,
        fail: Mutex<bool>,
    }

    #[async_trait]
    impl PriceFeed for CountingFeed {
        async fn last_price(&self, _symbol: &str) -> StoreResult<Option<Decimal>> {
            *self.calls.lock() += 1;
            if *self.fail.lock() {
                return Err(StoreError::Unavailable("feed down".to_string()));
            }
            Ok(*self.price.lock())
        }
    }

    fn make_feed(price: Option<Decimal>) -> Arc<CountingFeed> {
        Arc::new(CountingFeed {
            price: Mutex::new(price),
            calls: Mutex::new(0),
            fail: Mutex::new(false),
        })
    }

    #[tokio::test]
    async fn test_cache_hit_avoids_refetch() {
        let feed = make_feed(Some(dec!(100)));
        let cached = CachedPriceFeed::new(feed.clone() as Arc<dyn PriceFeed>);

        assert_eq!(cached.last_price("BTC/USDT").await, Some(dec!(100)));
        assert_eq!(cached.last_price("BTC/USDT").await, Some(dec!(100)));
        assert_eq!(*feed.calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_feed_failure_returns_none() {
        let feed = make_feed(Some(dec!(100)));
        *feed.fail.lock() = true;
        let cached = CachedPriceFeed::new(feed.clone() as Arc<dyn PriceFeed>);

        assert_eq!(cached.last_price("BTC/USDT").await, None);
    }

    #[tokio::test]
    async fn test_expired_entry_refetches() {
        let feed = make_feed(Some(dec!(100)));
        let cached =
            CachedPriceFeed::with_ttl(feed.clone() as Arc<dyn PriceFeed>, Duration::ZERO);

        cached.last_price("BTC/USDT").await;
        *feed.price.lock() = Some(dec!(101));
        assert_eq!(cached.last_price("BTC/USDT").await, Some(dec!(101)));
        assert_eq!(*feed.calls.lock(), 2);
    }
}
