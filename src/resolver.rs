//! Stat resolution pass.
//!
//! Provides the `StatResolver` type, which turns an entity list and a
//! player selection into resolved stats. Resolution runs a fixed number of
//! passes so that formulas reading other stats observe the previous pass's
//! values; there is no dependency graph at resolution time.

use crate::context::EvalContext;
use crate::entity::{Entity, EntityKind, Modifier, ModifierKind};
use crate::formula::{check_opt, evaluate, Layered};
use crate::helpers::{item_inputs, ItemHelpers};
use crate::resolved::{Breakdown, Contribution, StatResult};
use crate::selection::PlayerSelection;
use crate::stat_def::StatDefinition;
use crate::stat_id::{keys, StatKey};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::trace;

/// Number of resolution passes.
pub const PASS_COUNT: usize = 3;

/// An entity contributing modifiers, with its trace name.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSource {
    pub entity_id: String,
    pub name: String,
}

/// Everything one resolution produces.
#[derive(Debug, Clone)]
pub struct PassOutput {
    pub results: BTreeMap<StatKey, StatResult>,
    /// Last evaluated value of every active modifier, by modifier id.
    pub modifier_results: BTreeMap<String, f64>,
    /// Context of the final pass.
    pub eval_context: EvalContext,
    /// Contributing entities, in collection order.
    pub active_sources: Vec<ActiveSource>,
}

impl PassOutput {
    pub fn final_value(&self, key: &str) -> f64 {
        self.results.get(key).map_or(0.0, |r| r.final_value)
    }
}

struct Source<'a> {
    entity: &'a Entity,
    name: String,
    inputs: HashMap<String, f64>,
}

struct Gathered<'a> {
    sources: Vec<Source<'a>>,
    instances: Vec<&'a Entity>,
    custom: Vec<&'a Entity>,
}

/// An active modifier with its value for the current pass.
struct Applied<'a> {
    modifier: &'a Modifier,
    source: &'a str,
    kind: EntityKind,
    value: f64,
}

/// Resolves stats for one entity list.
///
/// # Examples
///
/// ```rust
/// use buildstat::entity::{Entity, ItemData, Modifier};
/// use buildstat::{PlayerSelection, StatDefinition, StatResolver};
///
/// let stats = vec![StatDefinition::new("vit", 100.0)];
/// let entities = vec![Entity::item("helm", "Helm", ItemData::new("armor"))
///     .with_modifier(Modifier::flat("helm_vit", "vit", "25"))];
///
/// let mut selection = PlayerSelection::new();
/// selection.equipment.insert("helmet".into(), "helm".into());
///
/// let output = StatResolver::new(&stats, &entities).resolve(&selection, &[]);
/// assert_eq!(output.final_value("vit"), 125.0);
/// ```
pub struct StatResolver<'a> {
    stat_defs: &'a [StatDefinition],
    entities: &'a [Entity],
    index: HashMap<&'a str, &'a Entity>,
}

impl<'a> StatResolver<'a> {
    pub fn new(stat_defs: &'a [StatDefinition], entities: &'a [Entity]) -> Self {
        let mut index = HashMap::with_capacity(entities.len());
        for entity in entities {
            index.entry(entity.id.as_str()).or_insert(entity);
        }
        Self {
            stat_defs,
            entities,
            index,
        }
    }

    pub fn entity(&self, id: &str) -> Option<&'a Entity> {
        self.index.get(id).copied()
    }

    /// Run all passes. `extra_item_ids` are appended to the selection's
    /// equipped ids (processor-created entities).
    pub fn resolve(&self, selection: &PlayerSelection, extra_item_ids: &[String]) -> PassOutput {
        let gathered = self.gather(selection, extra_item_ids);

        let mut results: BTreeMap<StatKey, StatResult> = self
            .stat_defs
            .iter()
            .map(|d| (d.key.clone(), StatResult::new(d.key.clone(), d.base_value)))
            .collect();
        let mut modifier_results = BTreeMap::new();
        let mut context = EvalContext::new();

        for pass in 0..PASS_COUNT {
            context = EvalContext::for_selection(selection);
            for result in results.values() {
                context.set_stat(&result.key, result.final_value, result.base);
            }
            context.set_pass(pass, PASS_COUNT);
            let final_pass = pass + 1 == PASS_COUNT;

            let helpers =
                ItemHelpers::new(&gathered.instances, &gathered.custom, selection, &context);
            let mut applied = Vec::new();
            for source in &gathered.sources {
                let scope = Layered {
                    top: &source.inputs,
                    base: &helpers,
                };
                for modifier in &source.entity.modifiers {
                    let toggled_on = modifier
                        .toggle_id
                        .as_deref()
                        .map_or(true, |t| selection.toggle(t));
                    if !toggled_on || !check_opt(modifier.condition.as_deref(), &scope) {
                        continue;
                    }
                    applied.push(Applied {
                        modifier,
                        source: source.name.as_str(),
                        kind: source.entity.kind,
                        value: evaluate(&modifier.value, &scope),
                    });
                }
            }
            applied.sort_by_key(|a| a.kind.priority());

            modifier_results = applied
                .iter()
                .map(|a| (a.modifier.id.clone(), a.value))
                .collect();

            results = self
                .stat_defs
                .iter()
                .map(|def| {
                    let mods: Vec<&Applied<'_>> = applied
                        .iter()
                        .filter(|a| def.key.matches(a.modifier.target.as_str()))
                        .collect();
                    (def.key.clone(), aggregate(def, &mods, final_pass))
                })
                .collect();

            trace!(pass, active = applied.len(), "stat pass resolved");
        }

        PassOutput {
            results,
            modifier_results,
            eval_context: context,
            active_sources: gathered
                .sources
                .iter()
                .map(|s| ActiveSource {
                    entity_id: s.entity.id.clone(),
                    name: s.name.clone(),
                })
                .collect(),
        }
    }

    fn gather(&self, selection: &PlayerSelection, extra_item_ids: &[String]) -> Gathered<'a> {
        let mut sources = Vec::new();
        let mut seen = BTreeSet::new();
        let mut push_once = |sources: &mut Vec<Source<'a>>, entity: &'a Entity| {
            if seen.insert(entity.id.as_str()) {
                sources.push(Source {
                    entity,
                    name: entity.name.clone(),
                    inputs: HashMap::new(),
                });
            }
        };

        let selected = [
            &selection.race_id,
            &selection.class_id,
            &selection.specialization_id,
            &selection.profession_id,
            &selection.career_id,
            &selection.faction_id,
            &selection.guild_id,
        ];
        let selected_ids = selected
            .into_iter()
            .flatten()
            .chain(selection.competence_ids.iter())
            .chain(selection.buff_ids.iter());
        for id in selected_ids {
            if let Some(entity) = self.entity(id) {
                push_once(&mut sources, entity);
            }
        }
        for rule in self.entities.iter().filter(|e| e.kind == EntityKind::GlobalRule) {
            push_once(&mut sources, rule);
        }

        let mut instances = Vec::new();
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        let equipped = selection.item_ids();
        for id in equipped.iter().chain(extra_item_ids.iter()) {
            let Some(entity) = self.entity(id) else {
                continue;
            };
            let seen_count = occurrences.entry(entity.id.as_str()).or_insert(0);
            *seen_count += 1;
            let name = if *seen_count > 1 {
                format!("{} #{}", entity.name, seen_count)
            } else {
                entity.name.clone()
            };
            if entity.kind == EntityKind::Item {
                instances.push(entity);
            }
            sources.push(Source {
                entity,
                name,
                inputs: item_inputs(entity, selection),
            });
        }

        let set_ids: Vec<&str> = instances
            .iter()
            .filter_map(|e| e.item.as_ref()?.set_id.as_deref())
            .collect();
        for set_id in set_ids {
            if let Some(set) = self.entity(set_id).filter(|e| e.kind == EntityKind::ItemSet) {
                push_once(&mut sources, set);
            }
        }

        let custom = selection
            .custom_items
            .iter()
            .filter_map(|id| self.entity(id))
            .collect();

        Gathered {
            sources,
            instances,
            custom,
        }
    }
}

/// Run a full resolution over `entities`.
pub fn resolve_pass(
    stat_defs: &[StatDefinition],
    entities: &[Entity],
    selection: &PlayerSelection,
    extra_item_ids: &[String],
) -> PassOutput {
    StatResolver::new(stat_defs, entities).resolve(selection, extra_item_ids)
}

fn trace_line(a: &Applied<'_>, suffix: &str) -> String {
    format!(
        "[{}] {} ({}): {} {:+}{}",
        a.kind.priority(),
        a.source,
        a.modifier.id,
        a.modifier.kind,
        a.value,
        suffix
    )
}

fn aggregate(def: &StatDefinition, mods: &[&Applied<'_>], final_pass: bool) -> StatResult {
    let mut result = StatResult::new(def.key.clone(), def.base_value);

    if let Some(winner) = mods
        .iter()
        .rev()
        .find(|a| a.modifier.kind == ModifierKind::Override && !a.modifier.per_turn)
    {
        result.log(trace_line(winner, " (override)"));
        result.final_value = def.finalize(winner.value);
        if final_pass {
            result.log(format!(
                "FINAL: {} (override by {})",
                result.final_value, winner.source
            ));
        }
        return result;
    }

    let is_cap = def.key.as_str() == keys::PARTITION_CAP;
    let mut cap: Option<(&str, f64)> = None;
    let mut b = Breakdown {
        base: def.base_value,
        ..Breakdown::default()
    };
    let mut detailed_base = vec![Contribution {
        source: "Base".to_string(),
        value: def.base_value,
    }];
    let mut detailed_flat = Vec::new();

    for a in mods {
        let v = a.value;
        if a.modifier.per_turn {
            if a.modifier.kind.is_percent() {
                result.per_turn_percent += v;
            } else if a.modifier.kind != ModifierKind::Override {
                result.per_turn += v;
            }
            result.log(trace_line(a, " per turn"));
            continue;
        }
        match a.modifier.kind {
            ModifierKind::Flat if is_cap => {
                if cap.map_or(true, |(_, best)| v > best) {
                    cap = Some((a.source, v));
                }
            }
            ModifierKind::Flat if a.kind.is_inherent() => {
                b.base += v;
                detailed_base.push(Contribution {
                    source: a.source.to_string(),
                    value: v,
                });
            }
            ModifierKind::Flat => {
                b.flat += v;
                detailed_flat.push(Contribution {
                    source: a.source.to_string(),
                    value: v,
                });
            }
            ModifierKind::PercentAdd => b.percent_add += v,
            ModifierKind::PercentMultiPre => b.percent_multi_pre += v,
            ModifierKind::FinalAdditivePercent => b.final_additive_percent += v,
            ModifierKind::AltFlat => b.alt_flat += v,
            ModifierKind::AltPercent => b.alt_percent += v,
            ModifierKind::Override => {}
        }
        result.log(trace_line(a, ""));
    }

    if let Some((source, best)) = cap {
        b.flat = best;
        detailed_flat.push(Contribution {
            source: source.to_string(),
            value: best,
        });
    }

    result.base = b.base;
    result.breakdown = b;
    result.final_value = def.finalize(b.compose());

    if final_pass {
        result.detailed_base = detailed_base;
        result.detailed_flat = detailed_flat;
        result.log(format!(
            "FINAL: {} = (({} + {}) x (1 + {}%) x (1 + {}%) x (1 + {}%) + {}) x (1 + {}%)",
            result.final_value,
            b.base,
            b.flat,
            b.percent_add,
            b.percent_multi_pre,
            b.final_additive_percent,
            b.alt_flat,
            b.alt_percent
        ));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ItemData;

    fn vit_only() -> Vec<StatDefinition> {
        vec![StatDefinition::new("vit", 100.0)]
    }

    fn armor(id: &str, modifiers: Vec<Modifier>) -> Entity {
        let mut e = Entity::item(id, id, ItemData::new("armor"));
        e.modifiers = modifiers;
        e
    }

    fn wearing(id: &str) -> PlayerSelection {
        let mut sel = PlayerSelection::new();
        sel.equipment.insert("armor".into(), id.into());
        sel
    }

    #[test]
    fn test_no_modifiers_rounds_base() {
        let stats = vec![StatDefinition::new("spd", 12.2)];
        let out = resolve_pass(&stats, &[], &PlayerSelection::new(), &[]);
        assert_eq!(out.final_value("spd"), 13.0);
    }

    #[test]
    fn test_full_stacking_formula() {
        use ModifierKind::*;
        let item = armor(
            "plate",
            vec![
                Modifier::new("a", Flat, "vit", "50"),
                Modifier::new("b", PercentAdd, "vit", "20"),
                Modifier::new("c", PercentMultiPre, "vit", "10"),
                Modifier::new("d", FinalAdditivePercent, "vit", "5"),
                Modifier::new("e", AltFlat, "vit", "10"),
                Modifier::new("f", AltPercent, "vit", "10"),
            ],
        );
        let out = resolve_pass(&vit_only(), &[item], &wearing("plate"), &[]);
        let vit = &out.results["vit"];
        assert_eq!(vit.final_value, 240.0);
        assert_eq!(vit.breakdown.flat, 50.0);
        assert!(vit.logs.last().unwrap().starts_with("FINAL: 240"));
    }

    #[test]
    fn test_override_wins() {
        let item = armor(
            "plate",
            vec![
                Modifier::flat("a", "vit", "50"),
                Modifier::new("o", ModifierKind::Override, "vit", "999"),
            ],
        );
        let out = resolve_pass(&vit_only(), &[item], &wearing("plate"), &[]);
        assert_eq!(out.final_value("vit"), 999.0);
    }

    #[test]
    fn test_last_override_after_priority_sort() {
        let race = Entity::new("elf", EntityKind::Race, "Elf")
            .with_modifier(Modifier::new("r", ModifierKind::Override, "vit", "10"));
        let item = armor(
            "plate",
            vec![Modifier::new("i", ModifierKind::Override, "vit", "20")],
        );
        let mut sel = wearing("plate");
        sel.race_id = Some("elf".into());
        let out = resolve_pass(&vit_only(), &[item, race], &sel, &[]);
        assert_eq!(out.final_value("vit"), 20.0);
    }

    #[test]
    fn test_partition_cap_takes_max() {
        let stats = vec![StatDefinition::new(keys::PARTITION_CAP, 0.0)];
        let a = armor("a", vec![Modifier::flat("a", keys::PARTITION_CAP, "2")]);
        let b = armor("b", vec![Modifier::flat("b", keys::PARTITION_CAP, "3")]);
        let mut sel = PlayerSelection::new();
        sel.backpack = vec!["a".into(), "b".into()];
        let out = resolve_pass(&stats, &[a, b], &sel, &[]);
        assert_eq!(out.final_value(keys::PARTITION_CAP), 3.0);
    }

    #[test]
    fn test_toggle_gating() {
        let item = armor("plate", vec![Modifier::flat("a", "vit", "50").toggled("rage")]);
        let entities = [item];
        let mut sel = wearing("plate");
        assert_eq!(resolve_pass(&vit_only(), &entities, &sel, &[]).final_value("vit"), 100.0);
        sel.toggles.insert("rage".into(), true);
        assert_eq!(resolve_pass(&vit_only(), &entities, &sel, &[]).final_value("vit"), 150.0);
    }

    #[test]
    fn test_condition_gating() {
        let item = armor("plate", vec![Modifier::flat("a", "vit", "50").when("level >= 10")]);
        let entities = [item];
        let mut sel = wearing("plate");
        sel.level = 5;
        assert_eq!(resolve_pass(&vit_only(), &entities, &sel, &[]).final_value("vit"), 100.0);
        sel.level = 10;
        assert_eq!(resolve_pass(&vit_only(), &entities, &sel, &[]).final_value("vit"), 150.0);
    }

    #[test]
    fn test_per_turn_isolated() {
        let item = armor(
            "plate",
            vec![
                Modifier::flat("a", "vit", "5").per_turn(),
                Modifier::new("b", ModifierKind::PercentAdd, "vit", "3").per_turn(),
                Modifier::new("c", ModifierKind::AltPercent, "vit", "2").per_turn(),
                Modifier::new("d", ModifierKind::Override, "vit", "1").per_turn(),
            ],
        );
        let out = resolve_pass(&vit_only(), &[item], &wearing("plate"), &[]);
        let vit = &out.results["vit"];
        assert_eq!(vit.final_value, 100.0);
        assert_eq!(vit.per_turn, 5.0);
        assert_eq!(vit.per_turn_percent, 5.0);
    }

    #[test]
    fn test_malformed_formula_contributes_zero() {
        let item = armor("plate", vec![Modifier::flat("a", "vit", "((")]);
        let out = resolve_pass(&vit_only(), &[item], &wearing("plate"), &[]);
        assert_eq!(out.final_value("vit"), 100.0);
        assert_eq!(out.modifier_results["a"], 0.0);
    }

    #[test]
    fn test_inherent_flat_goes_to_base() {
        let race = Entity::new("orc", EntityKind::Race, "Orc")
            .with_modifier(Modifier::flat("r", "vit", "20"));
        let mut sel = PlayerSelection::new();
        sel.race_id = Some("orc".into());
        let out = resolve_pass(&vit_only(), &[race], &sel, &[]);
        let vit = &out.results["vit"];
        assert_eq!(vit.base, 120.0);
        assert_eq!(vit.breakdown.flat, 0.0);
        assert_eq!(vit.detailed_base.len(), 2);
    }

    #[test]
    fn test_repeated_items_get_numbered() {
        let sword = Entity::item("sword", "Sword", ItemData::new("weapon"))
            .with_modifier(Modifier::flat("s", "vit", "10"));
        let mut sel = PlayerSelection::new();
        sel.weapons = vec![Some("sword".into()), Some("sword".into())];
        let out = resolve_pass(&vit_only(), &[sword], &sel, &[]);
        let vit = &out.results["vit"];
        assert_eq!(vit.final_value, 120.0);
        let names: Vec<&str> = vit.detailed_flat.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(names, vec!["Sword", "Sword #2"]);
    }

    #[test]
    fn test_reads_previous_pass_values() {
        let stats = vec![StatDefinition::new("vit", 100.0), StatDefinition::new("dmg", 0.0)];
        let item = armor("plate", vec![Modifier::flat("a", "dmg", "vit * 0.1")]);
        let out = resolve_pass(&stats, &[item], &wearing("plate"), &[]);
        assert_eq!(out.final_value("dmg"), 10.0);
    }

    #[test]
    fn test_item_inputs_and_config() {
        let item = Entity::item("totem", "Totem", ItemData::new("artifact").with_input("stacks", 2.0))
            .with_modifier(Modifier::flat("t", "vit", "stacks * 10"));
        let entities = [item];
        let mut sel = wearing("totem");
        assert_eq!(resolve_pass(&vit_only(), &entities, &sel, &[]).final_value("vit"), 120.0);
        sel.item_configs
            .insert("totem".into(), BTreeMap::from([("stacks".to_string(), 5.0)]));
        assert_eq!(resolve_pass(&vit_only(), &entities, &sel, &[]).final_value("vit"), 150.0);
    }

    #[test]
    fn test_global_rules_and_sets_apply() {
        let rule = Entity::new("rule", EntityKind::GlobalRule, "Rule")
            .with_modifier(Modifier::flat("g", "vit", "1"));
        let set = Entity::new("dragon_set", EntityKind::ItemSet, "Dragon Set")
            .with_modifier(Modifier::flat("ds", "vit", "countSet('dragon_set') * 5"));
        let helm = Entity::item("helm", "Helm", ItemData::new("armor").with_set("dragon_set"));
        let mut sel = PlayerSelection::new();
        sel.equipment.insert("helmet".into(), "helm".into());
        let out = resolve_pass(&vit_only(), &[rule, set, helm], &sel, &[]);
        assert_eq!(out.final_value("vit"), 106.0);
        assert!(out.active_sources.iter().any(|s| s.entity_id == "dragon_set"));
    }

    #[test]
    fn test_extra_ids_and_unknown_ids() {
        let buff = Entity::new("refund", EntityKind::Buff, "Refund")
            .with_modifier(Modifier::flat("r", "vit", "7"));
        let mut sel = PlayerSelection::new();
        sel.backpack.push("missing".into());
        let out = resolve_pass(&vit_only(), &[buff], &sel, &["refund".to_string()]);
        assert_eq!(out.final_value("vit"), 107.0);
    }

    #[test]
    fn test_unknown_target_ignored() {
        let item = armor("plate", vec![Modifier::flat("a", "mana", "50")]);
        let out = resolve_pass(&vit_only(), &[item], &wearing("plate"), &[]);
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.final_value("vit"), 100.0);
    }

    #[test]
    fn test_final_context_flags_last_pass() {
        let out = resolve_pass(&vit_only(), &[], &PlayerSelection::new(), &[]);
        assert!(out.eval_context.is_final_pass());
        assert_eq!(out.eval_context.number("vit"), Some(100.0));
    }
}
