//! Stat key module.
//!
//! Provides the `StatKey` type, an interned string naming a stat in the
//! catalogue, together with the well-known keys the engine treats
//! specially (summon proxies, partition capacity, companion scale).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// Interned identifier for a stat definition.
///
/// Uses `Arc<str>` so keys are cheap to clone into results, traces and
/// dependency graphs.
///
/// # Examples
///
/// ```rust
/// use buildstat::StatKey;
///
/// let vit = StatKey::new("vit");
/// assert_eq!(vit.base_key(), "base_vit");
/// assert_eq!(vit.local_base_key(), "local_base_vit");
///
/// let spd: StatKey = "spd".into();
/// assert_eq!(spd.as_str(), "spd");
/// ```
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct StatKey(Arc<str>);

impl Serialize for StatKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StatKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(StatKey::from(s))
    }
}

impl StatKey {
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Context name holding the previous pass's base value.
    pub fn base_key(&self) -> String {
        format!("base_{}", self.0)
    }

    /// Context name holding the base value scaled by `unit_scale`.
    pub fn local_base_key(&self) -> String {
        format!("local_base_{}", self.0)
    }

    /// Summon-context name holding the pre-final proxy value.
    pub fn pre_final_key(&self) -> String {
        format!("pre_{}", self.0)
    }

    /// Case-insensitive comparison against a raw key.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl From<&str> for StatKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StatKey {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl std::fmt::Display for StatKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::borrow::Borrow<str> for StatKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Keys the engine gives special meaning to.
pub mod keys {
    pub const VIT: &str = "vit";
    pub const SPD: &str = "spd";
    pub const DMG: &str = "dmg";
    pub const AURA: &str = "aura";
    pub const RES: &str = "res";
    pub const ABSORPTION: &str = "absorption";
    /// Flat contributions take the maximum instead of summing.
    pub const PARTITION_CAP: &str = "partition_cap";
    /// Added to every computed summon stat.
    pub const SUMMON_FLAT_BONUS: &str = "summon_flat_bonus";
    /// Percentage applied to companion display values.
    pub const COMPANION_SCALE: &str = "companion_scale";

    /// Stats exposed as pre-final proxies to summons and companions.
    pub const PROXY_STATS: [&str; 5] = [VIT, SPD, DMG, AURA, RES];
}
