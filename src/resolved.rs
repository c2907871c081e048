//! Resolution outputs.
//!
//! [`StatResult`] is the per-stat result of the last pass with its full
//! breakdown; [`ActiveSummon`] is one summoned unit group.

use crate::stat_id::StatKey;
use serde::{Deserialize, Serialize};

/// Every named sum that went into a stat's final value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    /// Definition base plus inherent flat contributions.
    pub base: f64,
    pub flat: f64,
    pub percent_add: f64,
    pub percent_multi_pre: f64,
    pub final_additive_percent: f64,
    pub alt_flat: f64,
    pub alt_percent: f64,
}

impl Breakdown {
    /// `(base + flat)` with the percent-add and pre-multi stages applied.
    pub fn pre_final(&self) -> f64 {
        (self.base + self.flat)
            * (1.0 + self.percent_add / 100.0)
            * (1.0 + self.percent_multi_pre / 100.0)
    }

    /// The full stacking formula, before clamping and rounding.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use buildstat::Breakdown;
    ///
    /// let b = Breakdown {
    ///     base: 100.0,
    ///     flat: 50.0,
    ///     percent_add: 20.0,
    ///     percent_multi_pre: 10.0,
    ///     final_additive_percent: 5.0,
    ///     alt_flat: 10.0,
    ///     alt_percent: 10.0,
    /// };
    /// assert!((b.compose() - 239.69).abs() < 1e-9);
    /// ```
    pub fn compose(&self) -> f64 {
        (self.pre_final() * (1.0 + self.final_additive_percent / 100.0) + self.alt_flat)
            * (1.0 + self.alt_percent / 100.0)
    }
}

/// A named contribution, for UI attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub source: String,
    pub value: f64,
}

/// Resolved value of one stat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatResult {
    pub key: StatKey,
    pub base: f64,
    pub final_value: f64,
    pub per_turn: f64,
    pub per_turn_percent: f64,
    pub breakdown: Breakdown,
    /// Contributors to `base`, captured on the final pass.
    pub detailed_base: Vec<Contribution>,
    /// Contributors to `flat`, captured on the final pass.
    pub detailed_flat: Vec<Contribution>,
    /// Trace of the last pass.
    pub logs: Vec<String>,
}

impl StatResult {
    /// A result holding only the definition's base value.
    pub fn new(key: StatKey, base: f64) -> Self {
        Self {
            key,
            base,
            final_value: base,
            per_turn: 0.0,
            per_turn_percent: 0.0,
            breakdown: Breakdown {
                base,
                ..Breakdown::default()
            },
            detailed_base: Vec::new(),
            detailed_flat: Vec::new(),
            logs: Vec::new(),
        }
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }

    /// Pre-final proxy used by summons and the companion display.
    pub fn pre_final(&self) -> f64 {
        self.breakdown.pre_final()
    }
}

/// Per-unit stats of a summon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    pub vit: f64,
    pub spd: f64,
    pub dmg: f64,
}

impl UnitStats {
    pub fn get_mut(&mut self, stat: &str) -> Option<&mut f64> {
        match stat {
            "vit" => Some(&mut self.vit),
            "spd" => Some(&mut self.spd),
            "dmg" => Some(&mut self.dmg),
            _ => None,
        }
    }
}

/// A group of identical summoned units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSummon {
    pub source_name: String,
    pub name: String,
    pub count: u32,
    pub stats: UnitStats,
}
