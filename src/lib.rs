//! # buildstat - Formula-Driven Character Build Stat Engine
//!
//! A stat calculation engine for tabletop-style character builders:
//! - **Formula-driven** modifiers (small expressions, not hardcoded rules)
//! - **Multi-pass** resolution, so stats can read other stats
//! - **Deterministic** (same catalogue and selection, same output)
//! - **Infallible** at runtime: broken content contributes `0`
//!
//! ## Core Concepts
//!
//! ### Stat Pipeline
//!
//! ```text
//! [Catalogue + PlayerSelection]
//!     → [VirtualEntityProcessor]s   (forge, boosts, refunds)
//!     → [StatResolver] × 3 passes   (modifiers aggregated per stat)
//!     → [SummonProcessor]s          (summoned units)
//!     → companion sub-engine
//!     → [CalculationResult]
//! ```
//!
//! Every stat aggregates its active modifiers with one stacking formula:
//!
//! ```text
//! ((base + flat) × (1 + pa%) × (1 + pmp%) × (1 + fap%) + alt_flat) × (1 + alt%)
//! ```
//!
//! then clamps to its bounds and rounds (to its precision, else up).
//!
//! ## Example
//!
//! ```rust
//! use buildstat::entity::{Entity, EntityKind, ItemData, Modifier, ModifierKind};
//! use buildstat::{Catalogue, Engine, PlayerSelection, StatDefinition};
//!
//! let catalogue = Catalogue::new(
//!     vec![StatDefinition::new("vit", 100.0)],
//!     vec![
//!         Entity::new("knight", EntityKind::Class, "Knight")
//!             .with_modifier(Modifier::new("knight_vit", ModifierKind::PercentAdd, "vit", "20")),
//!         Entity::item("plate", "Plate", ItemData::new("armor"))
//!             .with_modifier(Modifier::flat("plate_vit", "vit", "50")),
//!     ],
//! ).unwrap();
//!
//! let mut selection = PlayerSelection::new();
//! selection.class_id = Some("knight".into());
//! selection.equipment.insert("armor".into(), "plate".into());
//!
//! let result = Engine::new().calculate(&catalogue, &selection);
//! assert_eq!(result.final_value("vit"), 180.0); // (100 + 50) * 1.2
//! ```
//!
//! ## Modules
//!
//! - [`formula`] - Expression language: parser, evaluator, cache
//! - [`entity`] - Entities and modifiers
//! - [`selection`] - Player selection
//! - [`resolver`] - Multi-pass stat resolution
//! - [`processor`] / [`processors`] - Virtual entity processors
//! - [`summon`] - Summon resolution
//! - [`companion`] - Companion sub-engine
//! - [`engine`] - Orchestration
//! - [`diagnostics`] - Content linting

pub mod catalogue;
pub mod companion;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod engine;
pub mod entity;
pub mod error;
pub mod formula;
pub mod graph;
pub mod helpers;
pub mod preview;
pub mod processor;
pub mod processors;
pub mod resolved;
pub mod resolver;
pub mod selection;
pub mod stat_def;
pub mod stat_id;
pub mod summon;

// Re-export main types for convenience
pub use catalogue::Catalogue;
pub use companion::{CompanionResult, InclusionMode};
pub use config::EngineConfig;
pub use context::EvalContext;
pub use engine::{CalculationResult, Engine, EngineBuilder};
pub use entity::{Entity, EntityKind, Modifier, ModifierKind};
pub use error::{CatalogueError, EngineError, FormulaError};
pub use processor::{ProcessorOutput, VirtualEntityProcessor};
pub use resolved::{ActiveSummon, Breakdown, StatResult, UnitStats};
pub use resolver::{resolve_pass, PassOutput, StatResolver, PASS_COUNT};
pub use selection::PlayerSelection;
pub use stat_def::StatDefinition;
pub use stat_id::StatKey;
pub use summon::SummonProcessor;
