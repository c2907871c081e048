//! Stat catalogue entries.

use crate::stat_id::StatKey;
use serde::{Deserialize, Serialize};

/// One stat of the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatDefinition {
    pub key: StatKey,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub base_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Decimal places kept. `None` or `0` rounds up to an integer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default)]
    pub group: String,
}

impl StatDefinition {
    pub fn new(key: impl Into<StatKey>, base_value: f64) -> Self {
        let key = key.into();
        Self {
            label: key.to_string(),
            key,
            base_value,
            min: None,
            max: None,
            precision: None,
            group: String::new(),
        }
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Clamp to the definition's bounds, then round.
    pub fn finalize(&self, value: f64) -> f64 {
        let mut v = value;
        if let Some(min) = self.min {
            v = v.max(min);
        }
        if let Some(max) = self.max {
            v = v.min(max);
        }
        round_stat(v, self.precision)
    }
}

/// Digits kept before ceiling so that `110.00000000000001` rounds to `110`.
const CEIL_SNAP: f64 = 1e9;

/// Round a stat value: to `precision` decimals when positive, otherwise
/// up to the next integer.
///
/// # Examples
///
/// ```rust
/// use buildstat::stat_def::round_stat;
///
/// assert_eq!(round_stat(239.69, None), 240.0);
/// assert_eq!(round_stat(100.0 * 1.1, None), 110.0);
/// assert_eq!(round_stat(1.23456, Some(2)), 1.23);
/// assert_eq!(round_stat(-1.5, Some(0)), -1.0);
/// ```
pub fn round_stat(value: f64, precision: Option<u32>) -> f64 {
    match precision {
        Some(p) if p > 0 => {
            let factor = 10f64.powi(p as i32);
            (value * factor).round() / factor
        }
        _ => ceil_snapped(value),
    }
}

/// `ceil` that ignores floating-point noise below one billionth.
pub fn ceil_snapped(value: f64) -> f64 {
    ((value * CEIL_SNAP).round() / CEIL_SNAP).ceil()
}
