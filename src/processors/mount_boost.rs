//! Mount boost accessory.

use crate::context::EvalContext;
use crate::entity::{Entity, ModifierKind};
use crate::processor::{find, push_unique, ProcessorOutput, VirtualEntityProcessor};
use crate::selection::{PlayerSelection, SlotRef, SlotRewrite, MOUNT_BOOST_SUFFIX};
use crate::stat_id::keys;
use tracing::debug;

/// Slots whose occupants the accessory boosts.
pub const BOOSTED_SLOTS: [&str; 2] = ["mount", "familiar"];

/// While the accessory is carried in any bag, the mount and familiar get
/// their flat vitality, speed and damage multiplied. Per-turn flats are
/// left as authored.
#[derive(Debug, Clone)]
pub struct MountBoost {
    accessory_id: String,
    factor: f64,
}

impl MountBoost {
    pub fn new(accessory_id: impl Into<String>, factor: f64) -> Self {
        Self {
            accessory_id: accessory_id.into(),
            factor,
        }
    }

    fn boost(&self, entity: &Entity) -> Entity {
        let mut clone = entity.clone();
        clone.id = format!("{}{}", entity.id, MOUNT_BOOST_SUFFIX);
        for modifier in clone.modifiers.iter_mut().filter(|m| {
            m.kind == ModifierKind::Flat
                && !m.per_turn
                && [keys::VIT, keys::SPD, keys::DMG]
                    .iter()
                    .any(|k| m.target.matches(k))
        }) {
            modifier.value = format!("({}) * {}", modifier.value.trim(), self.factor);
        }
        clone
    }
}

impl VirtualEntityProcessor for MountBoost {
    fn name(&self) -> &str {
        "mount_boost"
    }

    fn process(
        &self,
        mut entities: Vec<Entity>,
        selection: &PlayerSelection,
        _preliminary: &EvalContext,
    ) -> ProcessorOutput {
        if self.accessory_id.is_empty() || !selection.bag_contains(&self.accessory_id) {
            return ProcessorOutput::unchanged(entities);
        }
        let mut rewrites = Vec::new();
        for slot in BOOSTED_SLOTS {
            let slot_ref = SlotRef::Fixed(slot.to_string());
            let Some(id) = selection.slot_item(&slot_ref) else {
                continue;
            };
            if id.ends_with(MOUNT_BOOST_SUFFIX) {
                continue;
            }
            let Some(index) = find(&entities, id) else {
                continue;
            };
            let clone = self.boost(&entities[index]);
            debug!(slot, entity = clone.id.as_str(), "mount boost");
            rewrites.push(SlotRewrite {
                slot: slot_ref,
                entity_id: clone.id.clone(),
            });
            push_unique(&mut entities, clone);
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
    use crate::entity::{ItemData, Modifier};

    fn horse() -> Entity {
        Entity::item("horse", "Horse", ItemData::new("mount"))
            .with_modifier(Modifier::flat("h_spd", "spd", "4"))
            .with_modifier(Modifier::new("h_pct", ModifierKind::PercentAdd, "vit", "10"))
            .with_modifier(Modifier::flat("h_regen", "vit", "2").per_turn())
    }

    #[test]
    fn test_boosts_mount_when_accessory_carried() {
        let mut sel = PlayerSelection::new();
        sel.equipment.insert("mount".into(), "horse".into());
        sel.backpack.push("saddle".into());
        let out = MountBoost::new("saddle", 1.5).process(vec![horse()], &sel, &EvalContext::new());
        let clone = out.entities.last().unwrap();
        assert_eq!(clone.id, "horse_mount_boosted");
        assert_eq!(clone.modifiers[0].value, "(4) * 1.5");
        assert_eq!(clone.modifiers[1].value, "10");
        assert_eq!(clone.modifiers[2].value, "2");
        assert_eq!(out.rewrites[0].slot, SlotRef::Fixed("mount".into()));
    }

    #[test]
    fn test_without_accessory_is_noop() {
        let mut sel = PlayerSelection::new();
        sel.equipment.insert("mount".into(), "horse".into());
        let out = MountBoost::new("saddle", 1.5).process(vec![horse()], &sel, &EvalContext::new());
        assert_eq!(out.entities.len(), 1);
        assert!(out.rewrites.is_empty());
    }
}
