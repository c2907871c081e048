//! Natural strength speed refund.

use crate::context::EvalContext;
use crate::entity::{Entity, EntityKind, Modifier, ModifierKind};
use crate::formula::{check_opt, evaluate, Layered};
use crate::helpers::item_inputs;
use crate::processor::{find, push_unique, ProcessorOutput, VirtualEntityProcessor};
use crate::selection::{PlayerSelection, SlotRef};
use crate::stat_id::keys;
use tracing::debug;

pub const REFUND_PREFIX: &str = "natural_strength_refund_";

/// Under the configured specialization, items in allocated slots stop
/// costing speed: each negative flat speed total is refunded by a buff.
#[derive(Debug, Clone)]
pub struct NaturalStrength {
    specialization_id: String,
}

impl NaturalStrength {
    pub fn new(specialization_id: impl Into<String>) -> Self {
        Self {
            specialization_id: specialization_id.into(),
        }
    }
}

/// Evaluated flat speed of `item` against the preliminary context.
fn flat_speed(item: &Entity, selection: &PlayerSelection, preliminary: &EvalContext) -> f64 {
    let inputs = item_inputs(item, selection);
    let scope = Layered {
        top: &inputs,
        base: preliminary,
    };
    item.modifiers_on(ModifierKind::Flat, keys::SPD)
        .filter(|m| !m.per_turn)
        .filter(|m| m.toggle_id.as_deref().map_or(true, |t| selection.toggle(t)))
        .filter(|m| check_opt(m.condition.as_deref(), &scope))
        .map(|m| evaluate(&m.value, &scope))
        .sum()
}

impl VirtualEntityProcessor for NaturalStrength {
    fn name(&self) -> &str {
        "natural_strength"
    }

    fn process(
        &self,
        mut entities: Vec<Entity>,
        selection: &PlayerSelection,
        preliminary: &EvalContext,
    ) -> ProcessorOutput {
        if self.specialization_id.is_empty()
            || selection.specialization_id.as_deref() != Some(self.specialization_id.as_str())
        {
            return ProcessorOutput::unchanged(entities);
        }

        let mut virtual_ids = Vec::new();
        for slot in &selection.natural_strength_slots {
            let Some(item_id) = selection.slot_item(&SlotRef::parse(slot)) else {
                continue;
            };
            let Some(index) = find(&entities, item_id) else {
                continue;
            };
            let speed = flat_speed(&entities[index], selection, preliminary);
            if speed >= 0.0 {
                continue;
            }
            let id = format!("{}{}", REFUND_PREFIX, slot);
            let refund = Entity::new(
                id.clone(),
                EntityKind::Buff,
                format!("Natural Strength ({})", entities[index].name),
            )
            .with_modifier(Modifier::flat(
                format!("{}_spd", id),
                keys::SPD,
                speed.abs().to_string(),
            ));
            debug!(slot = slot.as_str(), refund = speed.abs(), "natural strength refund");
            push_unique(&mut entities, refund);
            virtual_ids.push(id);
        }

        ProcessorOutput {
            entities,
            virtual_ids,
            rewrites: Vec::new(),
        }
    }
}
