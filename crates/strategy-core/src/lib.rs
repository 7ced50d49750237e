//! Market-making strategy decisions.
//!
//! This crate provides the building blocks of the per-tick trading decision:
//!
//! - **StrategyKind**: the closed set of strategies, each a pure
//!   `decide(input) -> Decision` function
//! - **StrategyManager**: per-market strategy registry, rule-table
//!   auto-selection, and confidence-weighted combination of votes
//! - **PriceGenerator**: turns raw strategy prices into human-like limit
//!   prices

mod decision;
mod manager;
mod price;
mod strategy;

pub use decision::{Decision, StrategyInput};
pub use manager::{combine, create_strategy_manager, SharedStrategyManager, StrategyManager};
pub use price::PriceGenerator;
pub use strategy::StrategyKind;

// Re-export commonly used types from dependencies for convenience
pub use model::Side;
