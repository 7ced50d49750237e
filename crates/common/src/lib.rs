//! Shared utilities: logging setup, retry backoff, execution mode, time.

mod backoff;
mod mode;
mod time;

pub use backoff::RetryBackoff;
pub use mode::{ExecutionMode, ParseModeError};
pub use time::{epoch_ms, utc_day_key};

use tracing_subscriber::EnvFilter;

/// Initialize structured logging from `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
