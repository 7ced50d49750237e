//! Autonomous market-making engine.
//!
//! `MarketMakerEngine` drives everything from a single tick loop: the global
//! risk gate, bounded fan-out over running markets, and periodic maintenance.
//! Each market is a `MarketInstance` combining strategies, risk assessment,
//! pool reservations, order placement, and internal matching.

mod config;
mod engine;
mod error;
mod manager;
mod market;
mod risk;
mod services;
mod settings;

pub use config::{EngineConfig, RiskConfig};
pub use engine::MarketMakerEngine;
pub use error::{EngineError, RiskRejection};
pub use manager::MarketManager;
pub use market::MarketInstance;
pub use risk::{
    create_risk_manager, RiskGate, RiskManager, SharedRiskManager, TradeAssessment,
};
pub use services::EngineServices;
pub use settings::{create_settings_cache, GlobalSettings, SettingsCache, SharedSettings};
