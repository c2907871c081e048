//! Content catalogue: stat definitions and entities.

use crate::entity::{Entity, EntityKind};
use crate::error::CatalogueError;
use crate::stat_def::StatDefinition;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Read-only game content.
///
/// # Examples
///
/// ```rust
/// use buildstat::Catalogue;
///
/// let catalogue = Catalogue::from_json_str(r#"{
///     "stats": [{ "key": "vit", "label": "Vitality", "baseValue": 100 }],
///     "entities": [{
///         "id": "elf", "type": "RACE", "name": "Elf",
///         "modifiers": [{ "id": "elf_vit", "type": "FLAT", "targetStatKey": "vit", "value": 20 }]
///     }]
/// }"#).unwrap();
///
/// assert_eq!(catalogue.stats.len(), 1);
/// assert_eq!(catalogue.entity("elf").unwrap().modifiers[0].value, "20");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalogue {
    pub stats: Vec<StatDefinition>,
    pub entities: Vec<Entity>,
}

impl Catalogue {
    /// Build a catalogue, rejecting duplicate stat keys and entity ids.
    pub fn new(stats: Vec<StatDefinition>, entities: Vec<Entity>) -> Result<Self, CatalogueError> {
        let catalogue = Self { stats, entities };
        catalogue.validate()?;
        Ok(catalogue)
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogueError> {
        let catalogue: Self = serde_json::from_str(json)?;
        catalogue.validate()?;
        Ok(catalogue)
    }

    pub fn validate(&self) -> Result<(), CatalogueError> {
        let mut keys = HashSet::new();
        for stat in &self.stats {
            if !keys.insert(stat.key.as_str()) {
                return Err(CatalogueError::DuplicateStat(stat.key.clone()));
            }
        }
        let mut ids = HashSet::new();
        for entity in &self.entities {
            if !ids.insert(entity.id.as_str()) {
                return Err(CatalogueError::DuplicateEntity(entity.id.clone()));
            }
        }
        Ok(())
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn stat(&self, key: &str) -> Option<&StatDefinition> {
        self.stats.iter().find(|s| s.key.matches(key))
    }

    pub fn entities_of(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |e| e.kind == kind)
    }
}
