//! Virtual entity processors.
//!
//! A processor expands or replaces entities before stat resolution, for
//! mechanics that cannot be expressed as a plain modifier: forge levels,
//! boosted clones, refund buffs. Processors never touch the caller's
//! selection. They return [`SlotRewrite`]s which the orchestrator applies to
//! a private copy between invocations.

use crate::context::EvalContext;
use crate::entity::Entity;
use crate::selection::{PlayerSelection, SlotRewrite};
use tracing::debug;

/// What one processor hands to the next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessorOutput {
    /// The full entity list, including any clones.
    pub entities: Vec<Entity>,
    /// Ids of created entities that are not reachable from a slot.
    pub virtual_ids: Vec<String>,
    /// Slot redirects to apply before the next processor runs.
    pub rewrites: Vec<SlotRewrite>,
}

impl ProcessorOutput {
    /// Output that leaves everything as it was.
    pub fn unchanged(entities: Vec<Entity>) -> Self {
        Self {
            entities,
            ..Self::default()
        }
    }
}

/// Trait for entity-list transformations run before resolution.
///
/// `preliminary` is the final context of a resolution over the unprocessed
/// entity list, for processors that need evaluated modifier values.
///
/// # Examples
///
/// ```rust
/// use buildstat::entity::{Entity, EntityKind, Modifier};
/// use buildstat::processor::{ProcessorOutput, VirtualEntityProcessor};
/// use buildstat::{EvalContext, PlayerSelection};
///
/// struct Blessing;
///
/// impl VirtualEntityProcessor for Blessing {
///     fn name(&self) -> &str {
///         "blessing"
///     }
///
///     fn process(
///         &self,
///         mut entities: Vec<Entity>,
///         _selection: &PlayerSelection,
///         _preliminary: &EvalContext,
///     ) -> ProcessorOutput {
///         entities.push(Entity::new("blessed", EntityKind::Buff, "Blessed")
///             .with_modifier(Modifier::flat("blessed_vit", "vit", "5")));
///         ProcessorOutput {
///             entities,
///             virtual_ids: vec!["blessed".into()],
///             rewrites: Vec::new(),
///         }
///     }
/// }
/// ```
pub trait VirtualEntityProcessor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn process(
        &self,
        entities: Vec<Entity>,
        selection: &PlayerSelection,
        preliminary: &EvalContext,
    ) -> ProcessorOutput;
}

/// Result of running the whole processor chain.
#[derive(Debug, Clone)]
pub struct Processed {
    pub entities: Vec<Entity>,
    pub virtual_ids: Vec<String>,
    /// The caller's selection with every rewrite applied.
    pub selection: PlayerSelection,
}

/// Run `processors` in order, threading the entity list and a private
/// selection copy through them.
pub fn run_processors(
    processors: &[Box<dyn VirtualEntityProcessor>],
    entities: Vec<Entity>,
    selection: &PlayerSelection,
    preliminary: &EvalContext,
) -> Processed {
    let mut selection = selection.clone();
    let mut entities = entities;
    let mut virtual_ids = Vec::new();

    for processor in processors {
        let before = entities.len();
        let output = processor.process(entities, &selection, preliminary);
        debug!(
            processor = processor.name(),
            created = output.entities.len().saturating_sub(before),
            rewrites = output.rewrites.len(),
            "processor applied"
        );
        for rewrite in &output.rewrites {
            selection.apply_rewrite(rewrite);
        }
        entities = output.entities;
        virtual_ids.extend(output.virtual_ids);
    }

    Processed {
        entities,
        virtual_ids,
        selection,
    }
}

/// Position of the entity with `id` in `entities`.
pub(crate) fn find(entities: &[Entity], id: &str) -> Option<usize> {
    entities.iter().position(|e| e.id == id)
}

/// Push `entity` unless an entity with the same id is already present.
pub(crate) fn push_unique(entities: &mut Vec<Entity>, entity: Entity) {
    if find(entities, &entity.id).is_none() {
        entities.push(entity);
    }
}
