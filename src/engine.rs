//! Calculation orchestration.
//!
//! [`Engine::calculate`] is the entry point: it runs the virtual entity
//! processors, the stat passes, the partition corrective pass, summon
//! resolution and, when enabled, the companion sub-engine.

use crate::catalogue::Catalogue;
use crate::companion::{companion_entities, companion_selection, CompanionResult};
use crate::config::EngineConfig;
use crate::context::EvalContext;
use crate::entity::Entity;
use crate::formula::cache;
use crate::processor::{run_processors, VirtualEntityProcessor};
use crate::processors::default_processors;
use crate::resolved::{ActiveSummon, StatResult};
use crate::resolver::{PassOutput, StatResolver};
use crate::selection::PlayerSelection;
use crate::stat_def::StatDefinition;
use crate::stat_id::{keys, StatKey};
use crate::summon::{default_summon_processors, resolve_summons, SummonProcessor};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, trace};

/// Everything one calculation produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResult {
    pub stats: BTreeMap<StatKey, StatResult>,
    pub modifier_results: BTreeMap<String, f64>,
    pub active_summons: Vec<ActiveSummon>,
    /// The entity list after processing, virtual clones included.
    pub final_entities: Vec<Entity>,
    pub eval_context: EvalContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub companion: Option<CompanionResult>,
}

impl CalculationResult {
    pub fn final_value(&self, key: &str) -> f64 {
        self.stats.get(key).map_or(0.0, |r| r.final_value)
    }
}

/// One resolution of a selection over an entity list.
struct Run {
    output: PassOutput,
    summons: Vec<ActiveSummon>,
    entities: Vec<Entity>,
}

/// The stat engine.
///
/// # Examples
///
/// ```rust
/// use buildstat::entity::{Entity, EntityKind, Modifier};
/// use buildstat::{Catalogue, Engine, PlayerSelection, StatDefinition};
///
/// let catalogue = Catalogue::new(
///     vec![StatDefinition::new("vit", 100.0)],
///     vec![Entity::new("dwarf", EntityKind::Race, "Dwarf")
///         .with_modifier(Modifier::flat("dwarf_vit", "vit", "level * 5"))],
/// ).unwrap();
///
/// let mut selection = PlayerSelection::new();
/// selection.race_id = Some("dwarf".into());
/// selection.level = 4;
///
/// let result = Engine::new().calculate(&catalogue, &selection);
/// assert_eq!(result.final_value("vit"), 120.0);
/// ```
pub struct Engine {
    config: EngineConfig,
    processors: Vec<Box<dyn VirtualEntityProcessor>>,
    summon_processors: Vec<Box<dyn SummonProcessor>>,
}

impl Engine {
    /// An engine with the default configuration and processors.
    pub fn new() -> Self {
        EngineBuilder::new().build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve `selection` against `catalogue`. Never fails; content
    /// errors contribute `0`.
    pub fn calculate(&self, catalogue: &Catalogue, selection: &PlayerSelection) -> CalculationResult {
        let player = self.run(&catalogue.stats, catalogue.entities.clone(), selection);

        let companion = selection.companion.enabled.then(|| {
            let scale = player.output.final_value(keys::COMPANION_SCALE);
            let entities = companion_entities(
                &catalogue.entities,
                &selection.companion,
                &self.config.companion_stats,
            );
            let run = self.run(&catalogue.stats, entities, &companion_selection(selection));
            debug!(scale, entities = run.entities.len(), "companion resolved");
            CompanionResult::new(run.output, run.summons, scale)
        });

        CalculationResult {
            stats: player.output.results,
            modifier_results: player.output.modifier_results,
            active_summons: player.summons,
            final_entities: player.entities,
            eval_context: player.output.eval_context,
            companion,
        }
    }

    fn run(&self, stats: &[StatDefinition], entities: Vec<Entity>, selection: &PlayerSelection) -> Run {
        let preliminary = StatResolver::new(stats, &entities)
            .resolve(selection, &[])
            .eval_context;
        let processed = run_processors(&self.processors, entities, selection, &preliminary);

        let resolver = StatResolver::new(stats, &processed.entities);
        let mut effective = processed.selection;
        let mut output = resolver.resolve(&effective, &processed.virtual_ids);

        let cap = output.final_value(keys::PARTITION_CAP);
        let filled = effective.filled_partitions();
        if cap > 0.0 && filled as f64 > cap {
            trace!(cap, filled, "partition corrective pass");
            effective.truncate_partitions(cap.floor() as usize);
            output = resolver.resolve(&effective, &processed.virtual_ids);
        }

        let summons = resolve_summons(
            &self.summon_processors,
            &processed.entities,
            &output,
            &effective,
            &self.config.summon_stats,
        );
        Run {
            output,
            summons,
            entities: processed.entities,
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field(
                "processors",
                &self.processors.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field(
                "summon_processors",
                &self.summon_processors.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builder for [`Engine`].
///
/// Without explicit processors the engine uses the default chains built
/// from its configuration.
///
/// # Examples
///
/// ```rust
/// use buildstat::processors::WeaponForge;
/// use buildstat::{Engine, EngineConfig};
///
/// let engine = Engine::builder()
///     .config(EngineConfig::default())
///     .processor(Box::new(WeaponForge))
///     .build();
/// assert_eq!(format!("{:?}", engine).contains("weapon_forge"), true);
/// ```
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    processors: Option<Vec<Box<dyn VirtualEntityProcessor>>>,
    summon_processors: Option<Vec<Box<dyn SummonProcessor>>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a virtual entity processor. The first call replaces the
    /// default chain.
    pub fn processor(mut self, processor: Box<dyn VirtualEntityProcessor>) -> Self {
        self.processors.get_or_insert_with(Vec::new).push(processor);
        self
    }

    /// Append a summon processor. The first call replaces the defaults.
    pub fn summon_processor(mut self, processor: Box<dyn SummonProcessor>) -> Self {
        self.summon_processors
            .get_or_insert_with(Vec::new)
            .push(processor);
        self
    }

    /// Run no virtual entity processors at all.
    pub fn without_processors(mut self) -> Self {
        self.processors = Some(Vec::new());
        self
    }

    pub fn build(self) -> Engine {
        if self.config.formula_cache_capacity != cache::capacity() {
            cache::set_capacity(self.config.formula_cache_capacity);
        }
        let processors = self
            .processors
            .unwrap_or_else(|| default_processors(&self.config));
        let summon_processors = self
            .summon_processors
            .unwrap_or_else(default_summon_processors);
        Engine {
            config: self.config,
            processors,
            summon_processors,
        }
    }
}
