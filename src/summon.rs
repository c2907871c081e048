//! Summon resolution.
//!
//! Runs after the stat passes. Summon formulas see every final stat value,
//! plus `pre_<key>` proxies: the pre-final total `(base + flat)` with the
//! percent-add and pre-multi stages applied, before final and alt stages.

use crate::context::EvalContext;
use crate::entity::{Entity, SummonConfig, SummonMode, SummonSpec};
use crate::formula::{check_opt, evaluate, FormulaScope, Layered};
use crate::helpers::item_inputs;
use crate::resolved::{ActiveSummon, UnitStats};
use crate::resolver::PassOutput;
use crate::selection::PlayerSelection;
use crate::stat_def::ceil_snapped;
use crate::stat_id::{keys, StatKey};
use std::collections::HashMap;
use tracing::debug;

/// Everything a summon processor may read.
pub struct SummonInput<'a> {
    /// Active entities with their trace names.
    pub sources: Vec<(&'a Entity, &'a str)>,
    pub context: &'a EvalContext,
    pub selection: &'a PlayerSelection,
    pub output: &'a PassOutput,
}

impl SummonInput<'_> {
    /// Resolved `summon_flat_bonus`, added to every summon stat.
    pub fn flat_bonus(&self) -> f64 {
        self.output.final_value(keys::SUMMON_FLAT_BONUS)
    }

    fn gated(&self, toggle_id: Option<&str>, condition: Option<&str>, scope: &dyn FormulaScope) -> bool {
        toggle_id.map_or(true, |t| self.selection.toggle(t)) && check_opt(condition, scope)
    }
}

/// Trait for producers of summoned units.
pub trait SummonProcessor: Send + Sync {
    fn name(&self) -> &str;

    fn summons(&self, input: &SummonInput<'_>) -> Vec<ActiveSummon>;
}

/// `count` evaluated and floored; `None` unless the raw value is positive.
/// A fractional count below one still emits the group, with `count` 0.
fn unit_count(formula: &str, scope: &dyn FormulaScope) -> Option<u32> {
    let count = evaluate(formula, scope);
    (count > 0.0).then(|| count.floor().min(f64::from(u32::MAX)) as u32)
}

/// Summons declared directly on entities, with per-stat formulas.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSummons;

impl StaticSummons {
    fn resolve(
        spec: &SummonSpec,
        source_name: &str,
        scope: &dyn FormulaScope,
        bonus: f64,
    ) -> Option<ActiveSummon> {
        let count = unit_count(&spec.count_value, scope)?;
        let stat = |formula: &str| ceil_snapped(evaluate(formula, scope)) + bonus;
        Some(ActiveSummon {
            source_name: source_name.to_string(),
            name: spec.name.clone(),
            count,
            stats: UnitStats {
                vit: stat(&spec.stats.vit),
                spd: stat(&spec.stats.spd),
                dmg: stat(&spec.stats.dmg),
            },
        })
    }
}

impl SummonProcessor for StaticSummons {
    fn name(&self) -> &str {
        "static"
    }

    fn summons(&self, input: &SummonInput<'_>) -> Vec<ActiveSummon> {
        let bonus = input.flat_bonus();
        let mut out = Vec::new();
        for &(entity, source_name) in &input.sources {
            if entity.summons.is_empty() {
                continue;
            }
            let inputs = item_inputs(entity, input.selection);
            let scope = Layered {
                top: &inputs,
                base: input.context,
            };
            for spec in &entity.summons {
                if !input.gated(spec.toggle_id.as_deref(), spec.condition.as_deref(), &scope) {
                    continue;
                }
                out.extend(Self::resolve(spec, source_name, &scope, bonus));
            }
        }
        out
    }
}

/// Summons whose units take a share of the player's final stats.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicSummons;

impl DynamicSummons {
    fn resolve(
        config: &SummonConfig,
        source_name: &str,
        scope: &dyn FormulaScope,
        input: &SummonInput<'_>,
    ) -> Option<ActiveSummon> {
        // a pool needs at least one unit to split across
        let count = unit_count(&config.count_value, scope).filter(|&c| c > 0)?;
        let share = evaluate(&config.share_percent, scope) / 100.0;
        let multiplier = match config.mode {
            SummonMode::SharedPool => share / f64::from(count),
            SummonMode::FixedPerUnit => share,
        };
        let bonus = input.flat_bonus();
        let mut stats = UnitStats::default();
        for key in &config.stats {
            if let Some(slot) = stats.get_mut(key.as_str()) {
                *slot = ceil_snapped(input.output.final_value(key.as_str()) * multiplier) + bonus;
            }
        }
        Some(ActiveSummon {
            source_name: source_name.to_string(),
            name: config.name.clone(),
            count,
            stats,
        })
    }
}

impl SummonProcessor for DynamicSummons {
    fn name(&self) -> &str {
        "dynamic"
    }

    fn summons(&self, input: &SummonInput<'_>) -> Vec<ActiveSummon> {
        let mut out = Vec::new();
        for &(entity, source_name) in &input.sources {
            let Some(config) = entity.summon_config.as_ref() else {
                continue;
            };
            let inputs = item_inputs(entity, input.selection);
            let scope = Layered {
                top: &inputs,
                base: input.context,
            };
            if !input.gated(config.toggle_id.as_deref(), config.condition.as_deref(), &scope) {
                continue;
            }
            out.extend(Self::resolve(config, source_name, &scope, input));
        }
        out
    }
}

pub fn default_summon_processors() -> Vec<Box<dyn SummonProcessor>> {
    vec![Box::new(StaticSummons), Box::new(DynamicSummons)]
}

/// Context for summon formulas: the selection's values, every final stat
/// and the `pre_<key>` proxy of each of `proxy_stats`.
pub fn summon_context(
    output: &PassOutput,
    selection: &PlayerSelection,
    proxy_stats: &[String],
) -> EvalContext {
    let mut context = EvalContext::for_selection(selection);
    for result in output.results.values() {
        context.set_stat(&result.key, result.final_value, result.base);
    }
    for key in proxy_stats {
        let key = StatKey::new(key);
        let proxy = output.results.get(&key).map_or(0.0, |r| r.pre_final());
        context.set(key.pre_final_key(), proxy);
    }
    context
}

/// Run every summon processor over the active sources of `output`.
pub fn resolve_summons(
    processors: &[Box<dyn SummonProcessor>],
    entities: &[Entity],
    output: &PassOutput,
    selection: &PlayerSelection,
    proxy_stats: &[String],
) -> Vec<ActiveSummon> {
    let index: HashMap<&str, &Entity> = entities.iter().rev().map(|e| (e.id.as_str(), e)).collect();
    let context = summon_context(output, selection, proxy_stats);
    let input = SummonInput {
        sources: output
            .active_sources
            .iter()
            .filter_map(|s| Some((*index.get(s.entity_id.as_str())?, s.name.as_str())))
            .collect(),
        context: &context,
        selection,
        output,
    };
    let mut summons = Vec::new();
    for processor in processors {
        let produced = processor.summons(&input);
        debug!(processor = processor.name(), count = produced.len(), "summons resolved");
        summons.extend(produced);
    }
    summons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityKind, Modifier, SummonStatFormulas};
    use crate::resolver::resolve_pass;
    use crate::stat_def::StatDefinition;

    fn stats() -> Vec<StatDefinition> {
        vec![
            StatDefinition::new("vit", 200.0),
            StatDefinition::new("spd", 10.0),
            StatDefinition::new("dmg", 40.0),
            StatDefinition::new(keys::SUMMON_FLAT_BONUS, 0.0),
        ]
    }

    fn necromancer(summon: SummonSpec) -> Entity {
        Entity::new("necro", EntityKind::Class, "Necromancer")
            .with_summon(summon)
            .with_modifier(Modifier::flat("nb", keys::SUMMON_FLAT_BONUS, "5"))
    }

    fn skeletons() -> SummonSpec {
        SummonSpec {
            id: "skel".into(),
            name: "Skeleton".into(),
            count_value: "3".into(),
            condition: None,
            toggle_id: None,
            stats: SummonStatFormulas {
                vit: "pre_vit / 4".into(),
                spd: "0".into(),
                dmg: "0".into(),
            },
        }
    }

    fn run(entities: &[Entity], sel: &PlayerSelection) -> Vec<ActiveSummon> {
        let out = resolve_pass(&stats(), entities, sel, &[]);
        resolve_summons(
            &default_summon_processors(),
            entities,
            &out,
            sel,
            &["vit".to_string(), "spd".to_string(), "dmg".to_string()],
        )
    }

    fn as_class() -> PlayerSelection {
        let mut sel = PlayerSelection::new();
        sel.class_id = Some("necro".into());
        sel
    }

    #[test]
    fn test_static_summon_uses_proxy_and_bonus() {
        let summons = run(&[necromancer(skeletons())], &as_class());
        assert_eq!(summons.len(), 1);
        assert_eq!(summons[0].count, 3);
        assert_eq!(summons[0].stats.vit, 55.0);
        assert_eq!(summons[0].stats.spd, 5.0);
        assert_eq!(summons[0].source_name, "Necromancer");
    }

    #[test]
    fn test_zero_count_skipped() {
        let mut spec = skeletons();
        spec.count_value = "level - 1".into();
        assert!(run(&[necromancer(spec)], &as_class()).is_empty());
    }

    #[test]
    fn test_fractional_count_kept() {
        let mut spec = skeletons();
        spec.count_value = "0.5".into();
        let summons = run(&[necromancer(spec)], &as_class());
        assert_eq!(summons.len(), 1);
        assert_eq!(summons[0].count, 0);

        let mut spec = skeletons();
        spec.count_value = "2.9".into();
        assert_eq!(run(&[necromancer(spec)], &as_class())[0].count, 2);
    }

    #[test]
    fn test_toggle_gated_summon() {
        let mut spec = skeletons();
        spec.toggle_id = Some("raise_dead".into());
        let entities = [necromancer(spec)];
        let mut sel = as_class();
        assert!(run(&entities, &sel).is_empty());
        sel.toggles.insert("raise_dead".into(), true);
        assert_eq!(run(&entities, &sel).len(), 1);
    }

    #[test]
    fn test_dynamic_shared_pool() {
        let druid = Entity::new("druid", EntityKind::Class, "Druid").with_summon_config(SummonConfig {
            name: "Wolf".into(),
            mode: SummonMode::SharedPool,
            count_value: "2".into(),
            share_percent: "50".into(),
            stats: vec![StatKey::new("vit"), StatKey::new("dmg")],
            condition: None,
            toggle_id: None,
        });
        let mut sel = PlayerSelection::new();
        sel.class_id = Some("druid".into());
        let summons = run(&[druid], &sel);
        assert_eq!(summons[0].count, 2);
        assert_eq!(summons[0].stats.vit, 50.0);
        assert_eq!(summons[0].stats.dmg, 10.0);
        assert_eq!(summons[0].stats.spd, 0.0);
    }

    #[test]
    fn test_dynamic_pool_below_one_unit_skipped() {
        let druid = Entity::new("druid", EntityKind::Class, "Druid").with_summon_config(SummonConfig {
            name: "Wolf".into(),
            mode: SummonMode::SharedPool,
            count_value: "0.5".into(),
            share_percent: "50".into(),
            stats: vec![StatKey::new("vit")],
            condition: None,
            toggle_id: None,
        });
        let mut sel = PlayerSelection::new();
        sel.class_id = Some("druid".into());
        assert!(run(&[druid], &sel).is_empty());
    }

    #[test]
    fn test_dynamic_fixed_per_unit() {
        let druid = Entity::new("druid", EntityKind::Class, "Druid").with_summon_config(SummonConfig {
            name: "Bear".into(),
            mode: SummonMode::FixedPerUnit,
            count_value: "2".into(),
            share_percent: "25".into(),
            stats: vec![StatKey::new("vit")],
            condition: Some("level >= 1".into()),
            toggle_id: None,
        });
        let mut sel = PlayerSelection::new();
        sel.class_id = Some("druid".into());
        assert_eq!(run(&[druid], &sel)[0].stats.vit, 50.0);
    }

    #[test]
    fn test_summon_context_proxies() {
        let out = resolve_pass(&stats(), &[], &PlayerSelection::new(), &[]);
        let ctx = summon_context(&out, &PlayerSelection::new(), &["vit".to_string()]);
        assert_eq!(ctx.number("pre_vit"), Some(200.0));
        assert_eq!(ctx.number("dmg"), Some(40.0));
    }
}
