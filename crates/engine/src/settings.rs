//! Typed global-settings snapshot with layered fallback.
//!
//! Admin-managed settings gate the whole engine, so reads must never block a
//! tick and must fail toward "cannot trade". The cache keeps three layers:
//! a fresh fetch (at most one per refresh interval), the last snapshot that
//! fetched successfully, and a hardcoded conservative floor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use store_core::SettingsStore;
use tracing::{debug, warn};

/// How long a fetched snapshot stays fresh.
const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Typed snapshot of the admin-managed global settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSettings {
    pub trading_enabled: bool,
    pub maintenance_mode: bool,
    pub global_pause: bool,
    pub stop_loss_enabled: bool,
    /// Daily loss (quote currency) past which the stop-loss gate closes.
    pub max_daily_loss: Decimal,
    pub max_concurrent_bots: usize,
    /// Minimum pool value (quote currency) required to start a market.
    pub min_pool_liquidity: Decimal,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            trading_enabled: true,
            maintenance_mode: false,
            global_pause: false,
            stop_loss_enabled: true,
            max_daily_loss: dec!(1000),
            max_concurrent_bots: 10,
            min_pool_liquidity: dec!(100),
        }
    }
}

impl GlobalSettings {
    /// The floor used when no snapshot has ever fetched successfully.
    ///
    /// Everything defaults except trading itself, which stays off until the
    /// settings store answers at least once.
    pub fn conservative_floor() -> Self {
        Self {
            trading_enabled: false,
            ..Self::default()
        }
    }
}

struct CacheState {
    snapshot: GlobalSettings,
    fetched_at: Option<Instant>,
    /// Whether `snapshot` came from a successful fetch (vs the floor).
    from_store: bool,
}

/// Read-through settings cache refreshing at most once per interval.
pub struct SettingsCache {
    store: Arc<dyn SettingsStore>,
    state: RwLock<CacheState>,
    refresh_interval: Duration,
}

impl SettingsCache {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self::with_refresh_interval(store, REFRESH_INTERVAL)
    }

    pub fn with_refresh_interval(store: Arc<dyn SettingsStore>, interval: Duration) -> Self {
        Self {
            store,
            state: RwLock::new(CacheState {
                snapshot: GlobalSettings::conservative_floor(),
                fetched_at: None,
                from_store: false,
            }),
            refresh_interval: interval,
        }
    }

    /// Current settings: fresh snapshot, else last known good, else floor.
    pub async fn current(&self) -> GlobalSettings {
        {
            let state = self.state.read();
            if let Some(fetched_at) = state.fetched_at {
                if fetched_at.elapsed() < self.refresh_interval {
                    return state.snapshot.clone();
                }
            }
        }

        match self.fetch().await {
            Ok(snapshot) => {
                let mut state = self.state.write();
                state.snapshot = snapshot.clone();
                state.fetched_at = Some(Instant::now());
                state.from_store = true;
                snapshot
            }
            Err(error) => {
                let mut state = self.state.write();
                if state.from_store {
                    warn!(%error, "settings refresh failed, using last known good");
                } else {
                    warn!(%error, "settings unavailable, trading stays disabled");
                }
                // Back off another full interval before retrying the store.
                state.fetched_at = Some(Instant::now());
                state.snapshot.clone()
            }
        }
    }

    /// Fetch every key; a missing key takes its default, a store error fails
    /// the whole fetch.
    async fn fetch(&self) -> Result<GlobalSettings, store_core::StoreError> {
        let defaults = GlobalSettings::default();
        let snapshot = GlobalSettings {
            trading_enabled: self
                .get_bool("aiMarketMakerEnabled", defaults.trading_enabled)
                .await?,
            maintenance_mode: self
                .get_bool("maintenanceMode", defaults.maintenance_mode)
                .await?,
            global_pause: self.get_bool("globalPause", defaults.global_pause).await?,
            stop_loss_enabled: self
                .get_bool("stopLossEnabled", defaults.stop_loss_enabled)
                .await?,
            max_daily_loss: self
                .get_decimal("maxDailyLoss", defaults.max_daily_loss)
                .await?,
            max_concurrent_bots: self
                .get_usize(
                    "aiMarketMakerMaxConcurrentBots",
                    defaults.max_concurrent_bots,
                )
                .await?,
            min_pool_liquidity: self
                .get_decimal("minPoolLiquidity", defaults.min_pool_liquidity)
                .await?,
        };
        debug!(?snapshot, "settings refreshed");
        Ok(snapshot)
    }

    async fn get_bool(&self, key: &str, default: bool) -> Result<bool, store_core::StoreError> {
        Ok(match self.store.get(key).await? {
            Some(value) => matches!(value.trim(), "true" | "1"),
            None => default,
        })
    }

    async fn get_decimal(
        &self,
        key: &str,
        default: Decimal,
    ) -> Result<Decimal, store_core::StoreError> {
        Ok(self
            .store
            .get(key)
            .await?
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default))
    }

    async fn get_usize(
        &self,
        key: &str,
        default: usize,
    ) -> Result<usize, store_core::StoreError> {
        Ok(self
            .store
            .get(key)
            .await?
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default))
    }
}

/// Shared handle to the settings cache.
pub type SharedSettings = Arc<SettingsCache>;

pub fn create_settings_cache(store: Arc<dyn SettingsStore>) -> SharedSettings {
    Arc::new(SettingsCache::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use store_core::memory::MemorySettings;

    fn make_cache(settings: Arc<MemorySettings>) -> SettingsCache {
        SettingsCache::new(settings)
    }

    #[tokio::test]
    async fn test_missing_keys_take_defaults() {
        let settings = Arc::new(MemorySettings::new());
        let cache = make_cache(settings);

        let snapshot = cache.current().await;
        assert!(snapshot.trading_enabled);
        assert!(snapshot.stop_loss_enabled);
        assert_eq!(snapshot.max_daily_loss, dec!(1000));
        assert_eq!(snapshot.max_concurrent_bots, 10);
    }

    #[tokio::test]
    async fn test_values_parse() {
        let settings = Arc::new(MemorySettings::new());
        settings.set("aiMarketMakerEnabled", "false");
        settings.set("maxDailyLoss", "2500");
        settings.set("aiMarketMakerMaxConcurrentBots", "3");
        let cache = make_cache(settings);

        let snapshot = cache.current().await;
        assert!(!snapshot.trading_enabled);
        assert_eq!(snapshot.max_daily_loss, dec!(2500));
        assert_eq!(snapshot.max_concurrent_bots, 3);
    }

    #[tokio::test]
    async fn test_floor_when_store_never_answered() {
        let settings = Arc::new(MemorySettings::new());
        settings.set_failing(true);
        let cache = make_cache(settings);

        let snapshot = cache.current().await;
        assert!(!snapshot.trading_enabled);
        assert!(snapshot.stop_loss_enabled);
    }

    #[tokio::test]
    async fn test_last_known_good_survives_outage() {
        let settings = Arc::new(MemorySettings::new());
        settings.set("maxDailyLoss", "500");
        let cache =
            SettingsCache::with_refresh_interval(settings.clone(), Duration::ZERO);

        let good = cache.current().await;
        assert!(good.trading_enabled);
        assert_eq!(good.max_daily_loss, dec!(500));

        settings.set_failing(true);
        let fallback = cache.current().await;
        assert_eq!(fallback, good);
    }

    #[tokio::test]
    async fn test_fresh_snapshot_skips_refetch() {
        let settings = Arc::new(MemorySettings::new());
        let cache = make_cache(settings.clone());

        let first = cache.current().await;
        // A store outage inside the refresh window is invisible
        settings.set_failing(true);
        let second = cache.current().await;
        assert_eq!(first, second);
        assert!(second.trading_enabled);
    }
}
