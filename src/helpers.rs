//! Item helper functions callable from formulas.
//!
//! `countItems('Sword')`, `sumItemStats('dmg', 'weapon')` and friends are
//! bound over the equipped instances of one pass. A query matches an item
//! by id, category, subcategory, tag or name substring, case-insensitively.

use crate::context::EvalContext;
use crate::entity::{Entity, ModifierKind};
use crate::error::FormulaError;
use crate::formula::{self, FormulaScope, Layered, Value};
use crate::selection::{original_id, PlayerSelection};
use std::cell::Cell;
use std::collections::HashMap;

/// Context key holding a global flat reduction applied to every item cost.
pub const ITEM_COST_REDUCTION: &str = "item_cost_reduction";

const MULTI_INSTRUMENT_TAG: &str = "multi_instrument";
const INSTRUMENT_PREFIX: &str = "instrument";
const CARDINAL_QUERY: &str = "cardinal";
const CARDINAL_GROUP: [&str; 4] = ["north", "south", "east", "west"];

/// Nested `sumItemStats` calls beyond this depth contribute nothing.
const MAX_HELPER_DEPTH: u8 = 2;

/// Whether `entity` matches a helper query.
///
/// # Examples
///
/// ```rust
/// use buildstat::entity::{Entity, ItemData};
/// use buildstat::helpers::item_matches;
///
/// let lute = Entity::item("lute", "Elven Lute", ItemData::new("instrument_string"));
/// assert!(item_matches(&lute, "elven"));
/// assert!(item_matches(&lute, "Instrument"));
/// assert!(!item_matches(&lute, "sword"));
/// ```
pub fn item_matches(entity: &Entity, query: &str) -> bool {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return true;
    }
    let Some(item) = entity.item.as_ref() else {
        return entity.name.to_lowercase().contains(&q);
    };
    let category = item.category.to_lowercase();
    let subcategory = item.subcategory.to_lowercase();
    let has_tag = |t: &str| item.tags.iter().any(|tag| tag.eq_ignore_ascii_case(t));

    if original_id(&entity.id).eq_ignore_ascii_case(&q)
        || category == q
        || subcategory == q
        || has_tag(&q)
        || entity.name.to_lowercase().contains(&q)
    {
        return true;
    }

    if q.starts_with(INSTRUMENT_PREFIX) {
        if has_tag(MULTI_INSTRUMENT_TAG) {
            return true;
        }
        if category.starts_with(&q) || subcategory.starts_with(&q) {
            return true;
        }
    }

    if q == CARDINAL_QUERY {
        return CARDINAL_GROUP
            .iter()
            .any(|dir| subcategory == *dir || has_tag(dir));
    }

    false
}

/// Values of an item's configurable inputs: defaults overlaid with the
/// player's configuration for that item.
pub fn item_inputs(entity: &Entity, selection: &PlayerSelection) -> HashMap<String, f64> {
    let mut values = HashMap::new();
    if let Some(item) = entity.item.as_ref() {
        for input in &item.inputs {
            values.insert(input.key.clone(), input.default_value);
        }
    }
    if let Some(config) = selection.item_config(&entity.id) {
        for (key, value) in config {
            values.insert(key.clone(), *value);
        }
    }
    values
}

/// Formula scope of one pass: context variables plus item helpers.
pub struct ItemHelpers<'a> {
    instances: &'a [&'a Entity],
    custom: &'a [&'a Entity],
    selection: &'a PlayerSelection,
    context: &'a EvalContext,
    depth: Cell<u8>,
}

impl<'a> ItemHelpers<'a> {
    pub fn new(
        instances: &'a [&'a Entity],
        custom: &'a [&'a Entity],
        selection: &'a PlayerSelection,
        context: &'a EvalContext,
    ) -> Self {
        Self {
            instances,
            custom,
            selection,
            context,
            depth: Cell::new(0),
        }
    }

    fn matching(&self, query: &str) -> impl Iterator<Item = &'a Entity> + '_ {
        let query = query.to_string();
        self.instances
            .iter()
            .copied()
            .filter(move |e| item_matches(e, &query))
    }

    /// Sum of the item's evaluated flat modifiers on `stat`.
    fn item_flat(&self, entity: &Entity, stat: &str) -> f64 {
        if self.depth.get() >= MAX_HELPER_DEPTH {
            return 0.0;
        }
        self.depth.set(self.depth.get() + 1);
        let inputs = item_inputs(entity, self.selection);
        let scope = Layered {
            top: &inputs,
            base: self,
        };
        let total = entity
            .modifiers_on(ModifierKind::Flat, stat)
            .filter(|m| !m.per_turn)
            .filter(|m| m.toggle_id.as_deref().map_or(true, |t| self.selection.toggle(t)))
            .filter(|m| formula::check_opt(m.condition.as_deref(), &scope))
            .map(|m| formula::evaluate(&m.value, &scope))
            .sum();
        self.depth.set(self.depth.get() - 1);
        total
    }

    fn effective_cost(&self, entity: &Entity) -> f64 {
        let global = self.context.number(ITEM_COST_REDUCTION).unwrap_or(0.0);
        entity
            .item
            .as_ref()
            .map_or(0.0, |i| (i.cost - i.cost_reduction - global).max(0.0))
    }

    fn original_cost(entity: &Entity) -> f64 {
        entity.item.as_ref().map_or(0.0, |i| i.cost)
    }

    fn dispatch(&self, name: &str, args: &[Value]) -> Option<Result<Value, FormulaError>> {
        let arg = |i: usize| -> String {
            match args.get(i) {
                Some(Value::Undefined) | None => String::new(),
                Some(v) => v.to_string(),
            }
        };
        let require = |n: usize| -> Result<(), FormulaError> {
            if args.len() < n {
                Err(FormulaError::Arity {
                    name: name.to_string(),
                    expected: format!("at least {}", n),
                    got: args.len(),
                })
            } else {
                Ok(())
            }
        };
        let number = |n: f64| -> Result<Value, FormulaError> { Ok(Value::Number(n)) };

        let result = match name {
            "countItems" => number(self.matching(&arg(0)).count() as f64),
            "hasItem" => require(1).map(|_| Value::Bool(self.matching(&arg(0)).next().is_some())),
            "countFaction" => require(1).map(|_| {
                let faction = arg(0);
                let n = self
                    .instances
                    .iter()
                    .filter_map(|e| e.item.as_ref()?.faction.as_deref())
                    .filter(|f| f.eq_ignore_ascii_case(&faction))
                    .count();
                Value::Number(n as f64)
            }),
            "countSet" => require(1).map(|_| {
                let set = arg(0);
                let n = self
                    .instances
                    .iter()
                    .filter_map(|e| e.item.as_ref()?.set_id.as_deref())
                    .filter(|s| s.eq_ignore_ascii_case(&set))
                    .count();
                Value::Number(n as f64)
            }),
            "sumItemStats" => require(1).map(|_| {
                let stat = arg(0);
                Value::Number(self.matching(&arg(1)).map(|e| self.item_flat(e, &stat)).sum())
            }),
            "bestItemStat" => require(1).map(|_| {
                let stat = arg(0);
                let best = self
                    .matching(&arg(1))
                    .map(|e| self.item_flat(e, &stat))
                    .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));
                Value::Number(best.unwrap_or(0.0))
            }),
            "sumItemCost" => number(self.matching(&arg(0)).map(|e| self.effective_cost(e)).sum()),
            "maxItemCost" => number(
                self.matching(&arg(0))
                    .map(|e| self.effective_cost(e))
                    .fold(0.0, f64::max),
            ),
            "sumOriginalItemCost" => {
                number(self.matching(&arg(0)).map(Self::original_cost).sum())
            }
            "maxOriginalItemCost" => number(
                self.matching(&arg(0))
                    .map(Self::original_cost)
                    .fold(0.0, f64::max),
            ),
            "countCustomItems" => {
                let query = arg(0);
                number(
                    self.custom
                        .iter()
                        .filter(|e| item_matches(e, &query))
                        .count() as f64,
                )
            }
            _ => return None,
        };
        Some(result)
    }
}

impl FormulaScope for ItemHelpers<'_> {
    fn variable(&self, name: &str) -> Option<Value> {
        self.context.variable(name)
    }

    fn call(&self, name: &str, args: &[Value]) -> Option<Result<Value, FormulaError>> {
        self.dispatch(name, args)
    }
}

/// Names of every helper function, for diagnostics.
pub const HELPER_NAMES: [&str; 11] = [
    "countItems",
    "countFaction",
    "countSet",
    "hasItem",
    "sumItemStats",
    "bestItemStat",
    "sumItemCost",
    "maxItemCost",
    "sumOriginalItemCost",
    "maxOriginalItemCost",
    "countCustomItems",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ItemData, Modifier};
    use crate::formula::evaluate;

    fn sword() -> Entity {
        Entity::item(
            "sword",
            "Iron Sword",
            ItemData::new("weapon")
                .with_subcategory("blade")
                .with_cost(4.0)
                .with_faction("Order")
                .with_set("iron_set"),
        )
        .with_modifier(Modifier::flat("sword_dmg", "dmg", "10 + bonus").when("level >= 1"))
    }

    fn lute() -> Entity {
        let mut data = ItemData::new("instrument_string").with_tag("multi_instrument");
        data.cost = 3.0;
        data.cost_reduction = 1.0;
        data.inputs.push(crate::entity::ItemInput {
            key: "bonus".into(),
            label: "Bonus".into(),
            default_value: 2.0,
        });
        Entity::item("lute", "Elven Lute", data)
            .with_modifier(Modifier::flat("lute_dmg", "dmg", "bonus * 2"))
    }

    fn compass() -> Entity {
        Entity::item("compass", "Compass", ItemData::new("trinket").with_subcategory("north"))
    }

    fn with_helpers<R>(f: impl FnOnce(&ItemHelpers<'_>) -> R) -> R {
        let entities = [sword(), sword(), lute(), compass()];
        let instances: Vec<&Entity> = entities.iter().collect();
        let custom: Vec<&Entity> = vec![&entities[3]];
        let mut selection = PlayerSelection::new();
        selection
            .item_configs
            .insert("sword".into(), [("bonus".to_string(), 5.0)].into());
        let mut context = EvalContext::with_defaults();
        context.set("level", 3.0);
        let helpers = ItemHelpers::new(&instances, &custom, &selection, &context);
        f(&helpers)
    }

    #[test]
    fn test_helper_names_match_dispatch() {
        with_helpers(|h| {
            let args = [Value::Str("vit".into())];
            for name in HELPER_NAMES {
                assert!(h.call(name, &args).is_some(), "{}", name);
            }
            assert!(h.call("itemFlatt", &args).is_none());
        });
    }

    #[test]
    fn test_count_and_has() {
        with_helpers(|h| {
            assert_eq!(evaluate("countItems('weapon')", h), 2.0);
            assert_eq!(evaluate("countItems('BLADE')", h), 2.0);
            assert_eq!(evaluate("countItems()", h), 4.0);
            assert_eq!(evaluate("hasItem('lute') ? 1 : 0", h), 1.0);
            assert_eq!(evaluate("hasItem('axe') ? 1 : 0", h), 0.0);
        });
    }

    #[test]
    fn test_faction_and_set() {
        with_helpers(|h| {
            assert_eq!(evaluate("countFaction('order')", h), 2.0);
            assert_eq!(evaluate("countSet('iron_set')", h), 2.0);
        });
    }

    #[test]
    fn test_sum_and_best_item_stats_use_item_inputs() {
        with_helpers(|h| {
            // sword: 10 + 5 (configured) each, lute: 2 * 2 (default input)
            assert_eq!(evaluate("sumItemStats('dmg')", h), 34.0);
            assert_eq!(evaluate("bestItemStat('dmg')", h), 15.0);
            assert_eq!(evaluate("sumItemStats('dmg', 'Instrument')", h), 4.0);
            assert_eq!(evaluate("bestItemStat('vit')", h), 0.0);
        });
    }

    #[test]
    fn test_costs() {
        with_helpers(|h| {
            assert_eq!(evaluate("sumItemCost()", h), 10.0);
            assert_eq!(evaluate("sumOriginalItemCost()", h), 11.0);
            assert_eq!(evaluate("maxItemCost('Instrument')", h), 2.0);
            assert_eq!(evaluate("maxOriginalItemCost()", h), 4.0);
        });
    }

    #[test]
    fn test_custom_items_and_cardinal_alias() {
        with_helpers(|h| {
            assert_eq!(evaluate("countCustomItems()", h), 1.0);
            assert_eq!(evaluate("countItems('cardinal')", h), 1.0);
        });
    }

    #[test]
    fn test_multi_instrument_matches_any_instrument_query() {
        let lute = lute();
        assert!(item_matches(&lute, "instrument_wind"));
        assert!(!item_matches(&sword(), "instrument_wind"));
    }

    #[test]
    fn test_missing_required_argument_is_zero() {
        with_helpers(|h| {
            assert_eq!(evaluate("countFaction()", h), 0.0);
        });
    }

    #[test]
    fn test_self_referential_sum_terminates() {
        let looping = Entity::item("loop", "Loop", ItemData::new("weapon"))
            .with_modifier(Modifier::flat("loop_dmg", "dmg", "1 + sumItemStats('dmg')"));
        let instances = vec![&looping];
        let selection = PlayerSelection::new();
        let context = EvalContext::with_defaults();
        let helpers = ItemHelpers::new(&instances, &[], &selection, &context);
        // depth 1: 1 + (depth 2: 1 + 0)
        assert_eq!(evaluate("sumItemStats('dmg')", &helpers), 2.0);
    }
}
