//! Companion sub-engine.
//!
//! A companion is resolved by the same engine as the player, over a
//! filtered entity list and a derived selection. Its displayed stats are
//! the pre-final totals scaled by the player's `companion_scale`.

use crate::entity::{Entity, EntityKind, ModifierKind};
use crate::resolved::{ActiveSummon, StatResult};
use crate::resolver::PassOutput;
use crate::selection::{original_id, resolve_config_key, CompanionSelection, PlayerSelection};
use crate::stat_def::ceil_snapped;
use crate::stat_id::StatKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How much of an item the companion inherits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionMode {
    None,
    /// Plain flat and percent-add modifiers on core stats only.
    StatsOnly,
    Full,
}

const FULL_BY_DEFAULT: [&str; 6] = ["weapon", "armor", "shield", "seal", "artifact", "rebreather"];

/// Inclusion of an item category when no override is set.
///
/// # Examples
///
/// ```rust
/// use buildstat::companion::{default_inclusion, InclusionMode};
///
/// assert_eq!(default_inclusion("Armor"), InclusionMode::Full);
/// assert_eq!(default_inclusion("enchantment"), InclusionMode::None);
/// ```
pub fn default_inclusion(category: &str) -> InclusionMode {
    if FULL_BY_DEFAULT
        .iter()
        .any(|c| c.eq_ignore_ascii_case(category))
    {
        InclusionMode::Full
    } else {
        InclusionMode::None
    }
}

/// Inclusion of `item`: the companion's override for it, else its
/// category default.
pub fn inclusion_for(item: &Entity, companion: &CompanionSelection) -> InclusionMode {
    resolve_config_key(&companion.inclusion, &item.id)
        .copied()
        .unwrap_or_else(|| default_inclusion(item.category()))
}

/// Strip `entity` down to unconditional flat and percent-add modifiers on
/// `whitelist` stats. Summons and description are dropped.
pub fn stats_only(entity: &Entity, whitelist: &[String]) -> Entity {
    let mut kept = entity.clone();
    kept.modifiers.retain(|m| {
        matches!(m.kind, ModifierKind::Flat | ModifierKind::PercentAdd)
            && m.toggle_id.is_none()
            && whitelist.iter().any(|s| m.target.matches(s))
    });
    kept.summons.clear();
    kept.summon_config = None;
    kept.description = None;
    kept
}

/// The entity list a companion resolves over.
pub fn companion_entities(
    entities: &[Entity],
    companion: &CompanionSelection,
    whitelist: &[String],
) -> Vec<Entity> {
    entities
        .iter()
        .filter(|e| {
            !companion.disallowed.contains(&e.id)
                && !companion.disallowed.contains(original_id(&e.id))
        })
        .filter_map(|e| match e.kind {
            EntityKind::Race | EntityKind::Class | EntityKind::GlobalRule => Some(e.clone()),
            EntityKind::Item => match inclusion_for(e, companion) {
                InclusionMode::None => None,
                InclusionMode::StatsOnly => Some(stats_only(e, whitelist)),
                InclusionMode::Full => Some(e.clone()),
            },
            _ => None,
        })
        .collect()
}

/// The selection a companion resolves with: the player's equipment with
/// the companion's own toggles, sliders and item configuration.
pub fn companion_selection(player: &PlayerSelection) -> PlayerSelection {
    let mirror = &player.companion;
    let mut selection = player.clone();
    selection.specialization_id = None;
    selection.profession_id = None;
    selection.career_id = None;
    selection.guild_id = None;
    selection.faction_id = None;
    selection.competence_ids.clear();
    selection.buff_ids.clear();
    selection.natural_strength_slots.clear();
    selection.toggles = mirror.toggles.clone();
    selection.sliders = mirror.sliders.clone();
    selection.item_configs = mirror.item_configs.clone();
    selection.companion = CompanionSelection::default();
    selection
}

/// Displayed companion value: `ceil(pre_final * scale / 100)`.
pub fn display_value(pre_final: f64, scale: f64) -> f64 {
    ceil_snapped(pre_final * scale / 100.0)
}

/// Companion output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanionResult {
    pub stats: BTreeMap<StatKey, StatResult>,
    /// Scaled display value per stat.
    pub display: BTreeMap<StatKey, f64>,
    pub active_summons: Vec<ActiveSummon>,
    /// The player's `companion_scale` the display was computed with.
    pub scale: f64,
}

impl CompanionResult {
    pub fn new(output: PassOutput, active_summons: Vec<ActiveSummon>, scale: f64) -> Self {
        let display = output
            .results
            .iter()
            .map(|(k, r)| (k.clone(), display_value(r.pre_final(), scale)))
            .collect();
        Self {
            stats: output.results,
            display,
            active_summons,
            scale,
        }
    }

    pub fn display_value(&self, key: &str) -> f64 {
        self.display.get(key).copied().unwrap_or(0.0)
    }
}
