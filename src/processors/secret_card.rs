//! Secret card weapon boost.
//!
//! A secret card equipped in a weapon slot boosts the weapon effect of
//! another weapon slot: every `weapon_effect_mult` read in the target's
//! formulas becomes `weapon_effect_mult + 1`. When the card names a fusion
//! ingredient, only modifiers labelled with that ingredient are boosted.

use crate::context::{EvalContext, WEAPON_EFFECT_MULT};
use crate::entity::Entity;
use crate::formula::replace_identifier;
use crate::processor::{find, push_unique, ProcessorOutput, VirtualEntityProcessor};
use crate::selection::{PlayerSelection, SlotRef, SlotRewrite, SECRET_BOOST_SUFFIX};
use tracing::debug;

const ID_MARKER: &str = "secret_card";

#[derive(Debug, Clone)]
pub struct SecretCard {
    marker: String,
}

impl SecretCard {
    /// `marker` identifies a card by name or description, case-insensitively.
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into().to_lowercase(),
        }
    }

    fn is_card(&self, entity: &Entity) -> bool {
        if entity.id.to_lowercase().contains(ID_MARKER) {
            return true;
        }
        if self.marker.is_empty() {
            return false;
        }
        entity.name.to_lowercase().contains(&self.marker)
            || entity
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&self.marker))
    }
}

/// Clone of `target` with its weapon effect boosted.
fn boosted(target: &Entity, ingredient: Option<&str>) -> Entity {
    let boosted_mult = format!("({} + 1)", WEAPON_EFFECT_MULT);
    let mut clone = target.clone();
    clone.id = format!("{}{}", target.id, SECRET_BOOST_SUFFIX);
    for modifier in clone.modifiers.iter_mut() {
        if ingredient.is_some_and(|i| !modifier.has_ingredient_tag(i)) {
            continue;
        }
        modifier.value = replace_identifier(&modifier.value, WEAPON_EFFECT_MULT, &boosted_mult);
    }
    clone
}

impl VirtualEntityProcessor for SecretCard {
    fn name(&self) -> &str {
        "secret_card"
    }

    fn process(
        &self,
        mut entities: Vec<Entity>,
        selection: &PlayerSelection,
        _preliminary: &EvalContext,
    ) -> ProcessorOutput {
        let provider = selection.weapons.iter().enumerate().find_map(|(slot, id)| {
            let index = find(&entities, id.as_deref()?)?;
            self.is_card(&entities[index]).then_some((slot, index))
        });
        let Some((card_slot, card_index)) = provider else {
            return ProcessorOutput::unchanged(entities);
        };
        let Some(target) = selection.secret_card_target(&entities[card_index].id) else {
            return ProcessorOutput::unchanged(entities);
        };
        let ingredient = target.ingredient.as_deref().filter(|i| !i.is_empty());
        if target.slot_index == card_slot && ingredient.is_none() {
            return ProcessorOutput::unchanged(entities);
        }
        let Some(target_id) = selection.slot_item(&SlotRef::Weapon(target.slot_index)) else {
            return ProcessorOutput::unchanged(entities);
        };
        if target_id.ends_with(SECRET_BOOST_SUFFIX) {
            return ProcessorOutput::unchanged(entities);
        }
        let Some(target_index) = find(&entities, target_id) else {
            return ProcessorOutput::unchanged(entities);
        };

        let clone = boosted(&entities[target_index], ingredient);
        debug!(
            card = entities[card_index].id.as_str(),
            target = clone.id.as_str(),
            "secret card boost"
        );
        let rewrite = SlotRewrite {
            slot: SlotRef::Weapon(target.slot_index),
            entity_id: clone.id.clone(),
        };
        push_unique(&mut entities, clone);
        ProcessorOutput {
            entities,
            virtual_ids: Vec::new(),
            rewrites: vec![rewrite],
        }
    }
}
