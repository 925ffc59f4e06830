//! Engine configuration.
//!
//! Loaded from JSON; every field has a default so partial files work.

use std::path::Path;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::decimal::AngleMode;

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 0x4D4B_3532;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sleep for each instruction's nominal duration while running.
    pub pacing: bool,
    /// Angle unit for trigonometric instructions.
    pub angle_mode: AngleMode,
    /// Seed for the random-number instruction, reapplied on power on.
    pub random_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pacing: false,
            angle_mode: AngleMode::default(),
            random_seed: DEFAULT_SEED,
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid configuration: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(!config.pacing);
        assert_eq!(config.angle_mode, AngleMode::Radian);
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(r#"{ "angle_mode": "degree" }"#).unwrap();
        assert_eq!(config.angle_mode, AngleMode::Degree);
        assert_eq!(config.random_seed, DEFAULT_SEED);
        assert!(!config.pacing);
    }

    #[test]
    fn test_round_trip() {
        let config = EngineConfig { pacing: true, angle_mode: AngleMode::Gradian, random_seed: 7 };
        let text = config.to_json().unwrap();
        assert_eq!(EngineConfig::from_json(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_unknown_angle() {
        assert!(matches!(
            EngineConfig::from_json(r#"{ "angle_mode": "turns" }"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
