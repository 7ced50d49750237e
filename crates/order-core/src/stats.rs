//! Per-market order counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lifetime order counters for one market.
#[derive(Debug, Default)]
pub struct OrderStats {
    created: AtomicU64,
    cancelled: AtomicU64,
    filled: AtomicU64,
    expired: AtomicU64,
}

impl OrderStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_filled(&self) {
        self.filled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn filled(&self) -> u64 {
        self.filled.load(Ordering::Relaxed)
    }

    pub fn expired(&self) -> u64 {
        self.expired.load(Ordering::Relaxed)
    }
}
