//! Execution mode configuration.
//!
//! Controls whether the engine places real-liquidity orders into the shared
//! order book or runs entirely against internal state.

use std::fmt;
use std::str::FromStr;

/// Engine execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Real-liquidity orders reach the shared order book.
    Live,
    /// Everything stays internal (AI order store only).
    #[default]
    Shadow,
}

impl ExecutionMode {
    /// Returns true if real-liquidity order placement is allowed.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Load mode from the `ENGINE_MODE` env var.
    ///
    /// Returns `Shadow` if not set or invalid.
    pub fn from_env() -> Self {
        std::env::var("ENGINE_MODE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Shadow => write!(f, "shadow"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "live" | "production" | "prod" => Ok(Self::Live),
            "shadow" | "sim" | "simulation" | "dry" => Ok(Self::Shadow),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

/// Error parsing an execution mode string.
#[derive(Debug, Clone)]
pub struct ParseModeError(String);

impl fmt::Display for ParseModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid mode '{}', expected 'live' or 'shadow'", self.0)
    }
}

impl std::error::Error for ParseModeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_live() {
        assert_eq!("live".parse::<ExecutionMode>().unwrap(), ExecutionMode::Live);
        assert_eq!("PROD".parse::<ExecutionMode>().unwrap(), ExecutionMode::Live);
    }

    #[test]
    fn test_parse_shadow() {
        assert_eq!("shadow".parse::<ExecutionMode>().unwrap(), ExecutionMode::Shadow);
        assert_eq!("sim".parse::<ExecutionMode>().unwrap(), ExecutionMode::Shadow);
        assert_eq!("DRY".parse::<ExecutionMode>().unwrap(), ExecutionMode::Shadow);
    }

    #[test]
    fn test_parse_invalid() {
        assert!("invalid".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn test_default_is_shadow() {
        assert_eq!(ExecutionMode::default(), ExecutionMode::Shadow);
        assert!(!ExecutionMode::default().is_live());
    }

    #[test]
    fn test_display() {
        assert_eq!(ExecutionMode::Live.to_string(), "live");
        assert_eq!(ExecutionMode::Shadow.to_string(), "shadow");
    }
}
