//! Weapon forge upgrades.

use crate::context::EvalContext;
use crate::entity::{Entity, Modifier, ModifierKind};
use crate::processor::{find, push_unique, ProcessorOutput, VirtualEntityProcessor};
use crate::selection::{PlayerSelection, SlotRef, SlotRewrite, UPGRADED_SLOT_SUFFIX};
use crate::stat_id::keys;
use tracing::debug;

const DAMAGE_PER_LEVEL: f64 = 50.0;
const GAUNTLET_DAMAGE_PER_LEVEL: f64 = 2.0;
const VITALITY_PER_LEVEL: f64 = 50.0;

/// Replaces each upgraded weapon with a per-slot clone whose flat bonus
/// carries the forge levels.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeaponForge;

fn is_kind(entity: &Entity, kind: &str) -> bool {
    entity.subcategory().eq_ignore_ascii_case(kind) || entity.category().eq_ignore_ascii_case(kind)
}

/// Stat the damage level of `weapon` upgrades, and the bonus per level.
fn upgrade_target(weapon: &Entity) -> (&'static str, f64) {
    if is_kind(weapon, "ring") {
        (keys::VIT, DAMAGE_PER_LEVEL)
    } else if is_kind(weapon, "gauntlet") {
        (keys::ABSORPTION, GAUNTLET_DAMAGE_PER_LEVEL)
    } else {
        (keys::DMG, DAMAGE_PER_LEVEL)
    }
}

/// Add `bonus` to a flat formula. A leading `<number> * <rest>` keeps its
/// multiplier: `10 * weapon_effect_mult` becomes
/// `(10 + 100) * weapon_effect_mult`.
pub fn add_flat_bonus(formula: &str, bonus: f64) -> String {
    let trimmed = formula.trim();
    let digits = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, rest) = trimmed.split_at(digits);
    if let Some(multiplier) = rest.trim_start().strip_prefix('*') {
        if !number.is_empty() && number.parse::<f64>().is_ok() && !multiplier.starts_with('*') {
            return format!("({} + {}) * {}", number, bonus, multiplier.trim_start());
        }
    }
    format!("({}) + {}", trimmed, bonus)
}

fn apply_bonus(entity: &mut Entity, stat: &str, bonus: f64) {
    if bonus == 0.0 {
        return;
    }
    let existing = entity
        .modifiers
        .iter_mut()
        .find(|m| m.kind == ModifierKind::Flat && !m.per_turn && m.target.matches(stat));
    match existing {
        Some(modifier) => modifier.value = add_flat_bonus(&modifier.value, bonus),
        None => {
            let id = format!("{}_forge_{}", entity.id, stat);
            entity
                .modifiers
                .push(Modifier::flat(id, stat, bonus.to_string()));
        }
    }
}

impl VirtualEntityProcessor for WeaponForge {
    fn name(&self) -> &str {
        "weapon_forge"
    }

    fn process(
        &self,
        mut entities: Vec<Entity>,
        selection: &PlayerSelection,
        _preliminary: &EvalContext,
    ) -> ProcessorOutput {
        let mut rewrites = Vec::new();
        for (&slot, upgrade) in &selection.weapon_upgrades {
            if upgrade.damage_level == 0 && upgrade.vitality_level == 0 {
                continue;
            }
            let Some(weapon_id) = selection.slot_item(&SlotRef::Weapon(slot)) else {
                continue;
            };
            let Some(index) = find(&entities, weapon_id) else {
                continue;
            };

            let mut upgraded = entities[index].clone();
            upgraded.id = format!("{}{}{}", weapon_id, UPGRADED_SLOT_SUFFIX, slot);
            let (target, per_level) = upgrade_target(&upgraded);
            apply_bonus(&mut upgraded, target, per_level * f64::from(upgrade.damage_level));
            apply_bonus(
                &mut upgraded,
                keys::VIT,
                VITALITY_PER_LEVEL * f64::from(upgrade.vitality_level),
            );
            debug!(slot, weapon = weapon_id, target, "forged weapon");

            rewrites.push(SlotRewrite {
                slot: SlotRef::Weapon(slot),
                entity_id: upgraded.id.clone(),
            });
            push_unique(&mut entities, upgraded);
        }
        ProcessorOutput {
            entities,
            virtual_ids: Vec::new(),
            rewrites,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ItemData;
    use crate::selection::WeaponUpgrade;

    fn run(weapon: Entity, upgrade: WeaponUpgrade) -> ProcessorOutput {
        let mut sel = PlayerSelection::new();
        sel.weapons = vec![None, Some(weapon.id.clone())];
        sel.weapon_upgrades.insert(1, upgrade);
        WeaponForge.process(vec![weapon], &sel, &EvalContext::new())
    }

    #[test]
    fn test_bonus_preserves_multiplier() {
        assert_eq!(
            add_flat_bonus("10 * weapon_effect_mult", 100.0),
            "(10 + 100) * weapon_effect_mult"
        );
        assert_eq!(add_flat_bonus("10", 100.0), "(10) + 100");
        assert_eq!(add_flat_bonus("level * 2", 50.0), "(level * 2) + 50");
        assert_eq!(add_flat_bonus("2 ** 3", 1.0), "(2 ** 3) + 1");
    }

    #[test]
    fn test_damage_upgrade_rewrites_flat() {
        let sword = Entity::item("sword", "Sword", ItemData::new("weapon"))
            .with_modifier(Modifier::flat("sword_dmg", "dmg", "10"));
        let out = run(
            sword,
            WeaponUpgrade {
                damage_level: 2,
                vitality_level: 0,
            },
        );
        assert_eq!(out.entities.len(), 2);
        let clone = &out.entities[1];
        assert_eq!(clone.id, "sword_upgraded_slot_1");
        assert_eq!(clone.modifiers[0].value, "(10) + 100");
        assert_eq!(out.rewrites[0].slot, SlotRef::Weapon(1));
        assert_eq!(out.entities[0].modifiers[0].value, "10");
    }

    #[test]
    fn test_gauntlet_and_vitality() {
        let gauntlet = Entity::item("fist", "Fist", ItemData::new("weapon").with_subcategory("gauntlet"));
        let out = run(
            gauntlet,
            WeaponUpgrade {
                damage_level: 3,
                vitality_level: 1,
            },
        );
        let clone = &out.entities[1];
        let absorption = clone.modifiers_on(ModifierKind::Flat, "absorption").next().unwrap();
        assert_eq!(absorption.value, "6");
        let vit = clone.modifiers_on(ModifierKind::Flat, "vit").next().unwrap();
        assert_eq!(vit.value, "50");
    }

    #[test]
    fn test_ring_stacks_both_on_vit() {
        let ring = Entity::item("band", "Band", ItemData::new("weapon").with_subcategory("ring"))
            .with_modifier(Modifier::flat("band_vit", "vit", "20 * weapon_effect_mult"));
        let out = run(
            ring,
            WeaponUpgrade {
                damage_level: 1,
                vitality_level: 1,
            },
        );
        assert_eq!(
            out.entities[1].modifiers[0].value,
            "((20 + 50) * weapon_effect_mult) + 50"
        );
    }

    #[test]
    fn test_no_levels_is_noop() {
        let sword = Entity::item("sword", "Sword", ItemData::new("weapon"));
        let out = run(sword, WeaponUpgrade::default());
        assert_eq!(out.entities.len(), 1);
        assert!(out.rewrites.is_empty());
    }
}
