//! Player selection.
//!
//! The [`PlayerSelection`] is the only long-lived mutable state of a build:
//! chosen race and class, equipped items, toggles, sliders and the companion
//! mirror. The engine reads it and never mutates the caller's copy.

use crate::companion::InclusionMode;
use crate::entity::Entity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Suffixes appended to ids of synthesized entities.
pub const UPGRADED_SLOT_SUFFIX: &str = "_upgraded_slot_";
pub const SECRET_BOOST_SUFFIX: &str = "_secret_boosted";
pub const MOUNT_BOOST_SUFFIX: &str = "_mount_boosted";

/// A reference to one equipment slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotRef {
    Fixed(String),
    Weapon(usize),
    Partition(usize),
}

impl SlotRef {
    /// Parse `weapon_<n>`, `partition_<n>` or a fixed slot name.
    pub fn parse(name: &str) -> SlotRef {
        let indexed = |prefix: &str| {
            name.strip_prefix(prefix)
                .and_then(|rest| rest.parse::<usize>().ok())
        };
        if let Some(i) = indexed("weapon_") {
            SlotRef::Weapon(i)
        } else if let Some(i) = indexed("partition_") {
            SlotRef::Partition(i)
        } else {
            SlotRef::Fixed(name.to_string())
        }
    }
}

/// Redirect a slot to another entity id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRewrite {
    pub slot: SlotRef,
    pub entity_id: String,
}

/// Forge levels of one weapon slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeaponUpgrade {
    pub damage_level: u32,
    pub vitality_level: u32,
}

/// Target of a secret card: a weapon slot and optionally a fusion ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretCardTarget {
    pub slot_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredient: Option<String>,
}

/// Companion-specific mirror of the selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanionSelection {
    pub enabled: bool,
    pub toggles: BTreeMap<String, bool>,
    pub sliders: BTreeMap<String, f64>,
    pub item_configs: BTreeMap<String, BTreeMap<String, f64>>,
    /// Per-entity inclusion mode, overriding the category defaults.
    pub inclusion: BTreeMap<String, InclusionMode>,
    pub disallowed: BTreeSet<String>,
}

fn default_level() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerSelection {
    pub race_id: Option<String>,
    pub class_id: Option<String>,
    pub specialization_id: Option<String>,
    pub profession_id: Option<String>,
    pub career_id: Option<String>,
    pub faction_id: Option<String>,
    pub guild_id: Option<String>,
    /// Racial and elite competences.
    pub competence_ids: Vec<String>,
    pub buff_ids: Vec<String>,

    /// Fixed slots by name (`helmet`, `armor`, `mount`, ...).
    pub equipment: BTreeMap<String, String>,
    pub weapons: Vec<Option<String>>,
    pub partitions: Vec<Option<String>>,
    pub backpack: Vec<String>,
    pub consumables: Vec<String>,
    pub custom_items: Vec<String>,

    pub item_configs: BTreeMap<String, BTreeMap<String, f64>>,
    pub toggles: BTreeMap<String, bool>,
    pub sliders: BTreeMap<String, f64>,
    #[serde(default = "default_level")]
    pub level: u32,
    pub soul_count: f64,

    /// Slot names allocated under the natural-strength specialization.
    pub natural_strength_slots: BTreeSet<String>,
    /// Forge levels keyed by weapon slot index.
    pub weapon_upgrades: BTreeMap<usize, WeaponUpgrade>,
    /// Secret card targets keyed by the card's id.
    pub secret_card_targets: BTreeMap<String, SecretCardTarget>,

    pub companion: CompanionSelection,
}

impl Default for PlayerSelection {
    fn default() -> Self {
        Self {
            race_id: None,
            class_id: None,
            specialization_id: None,
            profession_id: None,
            career_id: None,
            faction_id: None,
            guild_id: None,
            competence_ids: Vec::new(),
            buff_ids: Vec::new(),
            equipment: BTreeMap::new(),
            weapons: Vec::new(),
            partitions: Vec::new(),
            backpack: Vec::new(),
            consumables: Vec::new(),
            custom_items: Vec::new(),
            item_configs: BTreeMap::new(),
            toggles: BTreeMap::new(),
            sliders: BTreeMap::new(),
            level: default_level(),
            soul_count: 0.0,
            natural_strength_slots: BTreeSet::new(),
            weapon_upgrades: BTreeMap::new(),
            secret_card_targets: BTreeMap::new(),
            companion: CompanionSelection::default(),
        }
    }
}

impl PlayerSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// All equipped item ids: fixed slots, weapons, partitions, then the
    /// three bags. Repeats are kept.
    pub fn item_ids(&self) -> Vec<String> {
        self.equipment
            .values()
            .cloned()
            .chain(self.weapons.iter().flatten().cloned())
            .chain(self.partitions.iter().flatten().cloned())
            .chain(self.bag_ids().cloned())
            .collect()
    }

    pub fn bag_ids(&self) -> impl Iterator<Item = &String> {
        self.backpack
            .iter()
            .chain(self.consumables.iter())
            .chain(self.custom_items.iter())
    }

    pub fn bag_contains(&self, id: &str) -> bool {
        self.bag_ids().any(|b| b == id)
    }

    pub fn slot_item(&self, slot: &SlotRef) -> Option<&str> {
        match slot {
            SlotRef::Fixed(name) => self.equipment.get(name).map(String::as_str),
            SlotRef::Weapon(i) => self.weapons.get(*i).and_then(|w| w.as_deref()),
            SlotRef::Partition(i) => self.partitions.get(*i).and_then(|p| p.as_deref()),
        }
    }

    /// Point a slot at another entity. Out-of-range indexed slots are ignored.
    pub fn apply_rewrite(&mut self, rewrite: &SlotRewrite) {
        let id = rewrite.entity_id.clone();
        match &rewrite.slot {
            SlotRef::Fixed(name) => {
                self.equipment.insert(name.clone(), id);
            }
            SlotRef::Weapon(i) => {
                if let Some(slot) = self.weapons.get_mut(*i) {
                    *slot = Some(id);
                }
            }
            SlotRef::Partition(i) => {
                if let Some(slot) = self.partitions.get_mut(*i) {
                    *slot = Some(id);
                }
            }
        }
    }

    pub fn filled_partitions(&self) -> usize {
        self.partitions.iter().flatten().count()
    }

    /// Keep only the first `cap` filled partition slots.
    pub fn truncate_partitions(&mut self, cap: usize) {
        let mut kept = 0;
        for slot in self.partitions.iter_mut() {
            if slot.is_some() {
                if kept < cap {
                    kept += 1;
                } else {
                    *slot = None;
                }
            }
        }
    }

    pub fn toggle(&self, id: &str) -> bool {
        self.toggles.get(id).copied().unwrap_or(false)
    }

    /// Set a toggle; switching one on switches off every other toggle of
    /// the same group declared anywhere in `entities`.
    pub fn set_toggle(&mut self, entities: &[Entity], toggle_id: &str, on: bool) {
        if on {
            let groups: BTreeSet<&str> = entities
                .iter()
                .flat_map(|e| e.modifiers.iter())
                .filter(|m| m.toggle_id.as_deref() == Some(toggle_id))
                .filter_map(|m| m.toggle_group.as_deref())
                .collect();
            for peer in entities
                .iter()
                .flat_map(|e| e.modifiers.iter())
                .filter(|m| m.toggle_group.as_deref().is_some_and(|g| groups.contains(g)))
                .filter_map(|m| m.toggle_id.as_deref())
                .filter(|t| *t != toggle_id)
            {
                self.toggles.insert(peer.to_string(), false);
            }
        }
        self.toggles.insert(toggle_id.to_string(), on);
    }

    /// Item configuration for `id`, looking through synthesized-id suffixes.
    pub fn item_config(&self, id: &str) -> Option<&BTreeMap<String, f64>> {
        resolve_config_key(&self.item_configs, id)
    }

    pub fn secret_card_target(&self, id: &str) -> Option<&SecretCardTarget> {
        resolve_config_key(&self.secret_card_targets, id)
    }
}

/// Strip one synthesized-id suffix, if any.
fn strip_virtual_suffix(id: &str) -> Option<&str> {
    if let Some(stripped) = id.strip_suffix(SECRET_BOOST_SUFFIX) {
        return Some(stripped);
    }
    if let Some(stripped) = id.strip_suffix(MOUNT_BOOST_SUFFIX) {
        return Some(stripped);
    }
    let pos = id.rfind(UPGRADED_SLOT_SUFFIX)?;
    let index = &id[pos + UPGRADED_SLOT_SUFFIX.len()..];
    if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) {
        Some(&id[..pos])
    } else {
        None
    }
}

/// The catalogue id a synthesized id was derived from.
///
/// # Examples
///
/// ```rust
/// use buildstat::selection::original_id;
///
/// assert_eq!(original_id("bow_upgraded_slot_1_secret_boosted"), "bow");
/// assert_eq!(original_id("bow"), "bow");
/// ```
pub fn original_id(id: &str) -> &str {
    let mut current = id;
    while let Some(stripped) = strip_virtual_suffix(current) {
        current = stripped;
    }
    current
}

/// Look `id` up in `map`, retrying with suffixes stripped one at a time.
pub fn resolve_config_key<'a, V>(map: &'a BTreeMap<String, V>, id: &str) -> Option<&'a V> {
    let mut current = id;
    loop {
        if let Some(v) = map.get(current) {
            return Some(v);
        }
        current = strip_virtual_suffix(current)?;
    }
}
