//! "What if I equip this?" comparisons.

use crate::catalogue::Catalogue;
use crate::engine::Engine;
use crate::selection::{PlayerSelection, SlotRef};
use crate::stat_id::StatKey;
use serde::Serialize;

/// Change of one stat between two builds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatDelta {
    pub key: StatKey,
    pub before: f64,
    pub after: f64,
    pub delta: f64,
}

/// Highest weapon or partition index a preview may fill.
pub const MAX_INDEXED_SLOT: usize = 63;

/// `selection` with `item_id` placed in `slot`. Indexed slots grow as
/// needed up to [`MAX_INDEXED_SLOT`]; the bag names `backpack`,
/// `consumables` and `custom_items` append to that bag. `None` when the
/// slot index is out of range.
pub fn with_item(selection: &PlayerSelection, slot: &str, item_id: &str) -> Option<PlayerSelection> {
    let mut next = selection.clone();
    match slot {
        "backpack" => next.backpack.push(item_id.to_string()),
        "consumables" => next.consumables.push(item_id.to_string()),
        "custom_items" => next.custom_items.push(item_id.to_string()),
        _ => match SlotRef::parse(slot) {
            SlotRef::Fixed(name) => {
                next.equipment.insert(name, item_id.to_string());
            }
            SlotRef::Weapon(i) => place(&mut next.weapons, i, item_id)?,
            SlotRef::Partition(i) => place(&mut next.partitions, i, item_id)?,
        },
    }
    Some(next)
}

fn place(slots: &mut Vec<Option<String>>, index: usize, item_id: &str) -> Option<()> {
    if index > MAX_INDEXED_SLOT {
        return None;
    }
    if slots.len() <= index {
        slots.resize(index + 1, None);
    }
    slots[index] = Some(item_id.to_string());
    Some(())
}

/// Per-stat changes from equipping `item_id` in `slot`, sorted by key.
/// Unchanged stats are left out, and an out-of-range slot changes nothing.
///
/// # Examples
///
/// ```rust
/// use buildstat::entity::{Entity, ItemData, Modifier};
/// use buildstat::preview::preview_item;
/// use buildstat::{Catalogue, Engine, PlayerSelection, StatDefinition};
///
/// let catalogue = Catalogue::new(
///     vec![StatDefinition::new("vit", 100.0), StatDefinition::new("spd", 10.0)],
///     vec![Entity::item("helm", "Helm", ItemData::new("armor"))
///         .with_modifier(Modifier::flat("helm_vit", "vit", "30"))],
/// ).unwrap();
///
/// let deltas = preview_item(&Engine::new(), &catalogue, &PlayerSelection::new(), "helmet", "helm");
/// assert_eq!(deltas.len(), 1);
/// assert_eq!(deltas[0].delta, 30.0);
/// ```
pub fn preview_item(
    engine: &Engine,
    catalogue: &Catalogue,
    selection: &PlayerSelection,
    slot: &str,
    item_id: &str,
) -> Vec<StatDelta> {
    let Some(next) = with_item(selection, slot, item_id) else {
        return Vec::new();
    };
    let before = engine.calculate(catalogue, selection);
    let after = engine.calculate(catalogue, &next);
    after
        .stats
        .iter()
        .filter_map(|(key, result)| {
            let old = before.final_value(key.as_str());
            let delta = result.final_value - old;
            (delta != 0.0).then(|| StatDelta {
                key: key.clone(),
                before: old,
                after: result.final_value,
                delta,
            })
        })
        .collect()
}
