//! Engine configuration.
//!
//! Content-specific identifiers and tuning values live here rather than in
//! the processors, so a catalogue can ship its own JSON configuration.

use crate::error::EngineError;
use crate::formula::cache;
use crate::stat_id::keys;
use serde::{Deserialize, Serialize};

/// Runtime settings of an [`Engine`](crate::Engine).
///
/// # Examples
///
/// ```rust
/// use buildstat::EngineConfig;
///
/// let config = EngineConfig::from_json_str(r#"{ "mountBoostFactor": 2.0 }"#).unwrap();
/// assert_eq!(config.mount_boost_factor, 2.0);
/// assert_eq!(config.formula_cache_capacity, 2000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub formula_cache_capacity: usize,
    /// Stats whose modifiers survive stats-only companion inclusion.
    pub companion_stats: Vec<String>,
    /// Stats exposed to summon formulas as `pre_<key>`.
    pub summon_stats: Vec<String>,
    pub natural_strength_specialization: String,
    pub mount_boost_accessory: String,
    pub mount_boost_factor: f64,
    /// Name or description marker of secret cards.
    pub secret_card_marker: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            formula_cache_capacity: cache::DEFAULT_CAPACITY,
            companion_stats: [
                keys::VIT,
                keys::SPD,
                keys::DMG,
                keys::AURA,
                keys::RES,
                keys::ABSORPTION,
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            summon_stats: keys::PROXY_STATS.iter().map(|s| s.to_string()).collect(),
            natural_strength_specialization: "natural_strength".to_string(),
            mount_boost_accessory: "mount_boost".to_string(),
            mount_boost_factor: 1.5,
            secret_card_marker: "secret card".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.mount_boost_factor, 1.5);
        assert_eq!(config.summon_stats.len(), 5);
        assert!(config.companion_stats.iter().any(|s| s == "absorption"));
    }

    #[test]
    fn test_partial_json() {
        let config =
            EngineConfig::from_json_str(r#"{ "naturalStrengthSpecialization": "titan" }"#).unwrap();
        assert_eq!(config.natural_strength_specialization, "titan");
        assert_eq!(config.secret_card_marker, "secret card");
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            EngineConfig::from_json_str("{ nope"),
            Err(EngineError::Config(_))
        ));
    }
}
