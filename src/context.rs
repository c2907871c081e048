//! Evaluation context for formulas.
//!
//! The `EvalContext` is the named-value table formulas read from: player
//! level, sliders, toggles and the previous pass's stat values. Well-known
//! entries have dedicated setters; content-defined values go through
//! [`EvalContext::set`].

use crate::formula::{FormulaScope, Value};
use crate::selection::PlayerSelection;
use crate::stat_id::StatKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const PASS_INDEX: &str = "pass_index";
pub const IS_FINAL_PASS: &str = "is_final_pass";
pub const UNIT_SCALE: &str = "unit_scale";
pub const WEAPON_EFFECT_MULT: &str = "weapon_effect_mult";
pub const LEVEL: &str = "level";
pub const SOUL_COUNT: &str = "soul_count";

/// Named values visible to formulas.
///
/// # Examples
///
/// ```rust
/// use buildstat::EvalContext;
/// use buildstat::formula::evaluate;
///
/// let mut context = EvalContext::with_defaults();
/// context.set("level", 20.0);
/// context.set("in_combat", true);
///
/// assert_eq!(evaluate("in_combat ? level * weapon_effect_mult : 0", &context), 20.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalContext {
    data: HashMap<String, Value>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context carrying the engine defaults every formula may rely on.
    pub fn with_defaults() -> Self {
        let mut context = Self::new();
        context.set(WEAPON_EFFECT_MULT, 1.0);
        context.set(UNIT_SCALE, 1.0);
        context.set(LEVEL, 1.0);
        context.set(SOUL_COUNT, 0.0);
        context
    }

    /// Defaults overlaid with the selection's level, soul count, sliders
    /// and toggles.
    pub fn for_selection(selection: &PlayerSelection) -> Self {
        let mut context = Self::with_defaults();
        context.set(LEVEL, f64::from(selection.level));
        context.set(SOUL_COUNT, selection.soul_count);
        for (key, value) in &selection.sliders {
            context.set(key.as_str(), *value);
        }
        for (key, on) in &selection.toggles {
            context.set(key.as_str(), *on);
        }
        context
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Numeric view of a value; missing keys read as `None`.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.data.get(key).map(Value::to_number)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Publish a stat's values under `<key>`, `base_<key>` and
    /// `local_base_<key>` (base scaled by `unit_scale`).
    pub fn set_stat(&mut self, key: &StatKey, final_value: f64, base: f64) {
        let scale = self.number(UNIT_SCALE).unwrap_or(1.0);
        self.set(key.as_str(), final_value);
        self.set(key.base_key(), base);
        self.set(key.local_base_key(), base * scale);
    }

    pub fn set_pass(&mut self, index: usize, total: usize) {
        self.set(PASS_INDEX, index as f64);
        self.set(IS_FINAL_PASS, index + 1 == total);
    }

    pub fn is_final_pass(&self) -> bool {
        self.get(IS_FINAL_PASS).is_some_and(Value::truthy)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }
}

impl FormulaScope for EvalContext {
    fn variable(&self, name: &str) -> Option<Value> {
        self.data.get(name).cloned()
    }
}
