//! Copy-trading pipeline.
//!
//! `TradeListener` intercepts leader orders and enqueues them; the
//! `CopyTradeProcessor` drains the queue and replicates each trade to the
//! leader's followers, one serializable transaction per follower.

mod config;
mod error;
mod listener;
mod processor;
mod queue;

pub use config::CopyConfig;
pub use error::CopyError;
pub use listener::TradeListener;
pub use processor::CopyTradeProcessor;
pub use queue::{create_copy_queue, CopyTask, CopyTradeQueue, SharedCopyQueue};
