//! Copy-trading pipeline configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Tunables for the replication pipeline.
#[derive(Debug, Clone)]
pub struct CopyConfig {
    /// How often the processor polls the queue, in milliseconds.
    pub drain_interval_ms: u64,
    /// Followers replicated concurrently per leader trade.
    pub follower_batch_size: usize,
    /// Attempts per follower before giving up on transient failures.
    pub max_retries: u32,
    /// Base delay for the linear retry backoff, in milliseconds.
    pub retry_base_ms: u64,
    /// Smallest copy order worth placing, in quote currency.
    pub min_order_quote: Decimal,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            drain_interval_ms: 100,
            follower_batch_size: 10,
            max_retries: 3,
            retry_base_ms: 500,
            min_order_quote: dec!(10),
        }
    }
}

impl CopyConfig {
    pub fn with_drain_interval_ms(mut self, ms: u64) -> Self {
        self.drain_interval_ms = ms;
        self
    }

    pub fn with_follower_batch_size(mut self, size: usize) -> Self {
        self.follower_batch_size = size;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_base_ms(mut self, ms: u64) -> Self {
        self.retry_base_ms = ms;
        self
    }

    pub fn with_min_order_quote(mut self, minimum: Decimal) -> Self {
        self.min_order_quote = minimum;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CopyConfig::default();
        assert_eq!(config.drain_interval_ms, 100);
        assert_eq!(config.follower_batch_size, 10);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.min_order_quote, dec!(10));
    }

    #[test]
    fn test_builder_overrides() {
        let config = CopyConfig::default()
            .with_drain_interval_ms(10)
            .with_max_retries(1)
            .with_min_order_quote(dec!(1));
        assert_eq!(config.drain_interval_ms, 10);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.min_order_quote, dec!(1));
    }
}
