//! In-memory cache, settings, and price feed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::cache::{KvCache, PriceFeed, SettingsStore};
use crate::error::{StoreError, StoreResult};

/// TTL key-value cache backed by a HashMap.
#[derive(Default)]
pub struct MemoryKvCache {
    entries: RwLock<HashMap<String, (Option<Instant>, String)>>,
}

impl MemoryKvCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvCache for MemoryKvCache {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.read();
        Ok(entries.get(key).and_then(|(expires_at, value)| {
            match expires_at {
                Some(deadline) if Instant::now() >= *deadline => None,
                _ => Some(value.clone()),
            }
        }))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .write()
            .insert(key.to_string(), (expires_at, value.to_string()));
        Ok(())
    }
}

/// Settings store backed by a HashMap, with a failure switch for tests.
#[derive(Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
    failing: RwLock<bool>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: &str) {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.write() = failing;
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        if *self.failing.read() {
            return Err(StoreError::Unavailable("settings down".to_string()));
        }
        Ok(self.values.read().get(key).cloned())
    }
}

/// Price feed backed by a symbol map.
#[derive(Default)]
pub struct MemoryPriceFeed {
    prices: RwLock<HashMap<String, Decimal>>,
}

impl MemoryPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.write().insert(symbol.to_string(), price);
    }
}

#[async_trait]
impl PriceFeed for MemoryPriceFeed {
    async fn last_price(&self, symbol: &str) -> StoreResult<Option<Decimal>> {
        Ok(self.prices.read().get(symbol).copied())
    }
}
