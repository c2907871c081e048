//! Entity and modifier model.
//!
//! Everything that can affect stats is an [`Entity`]: races, classes,
//! items, rules, buffs. Entities carry [`Modifier`]s, each a formula-valued
//! effect on one stat, optionally gated by a condition or a player toggle.

use crate::stat_id::{keys, StatKey};
use serde::{Deserialize, Deserializer, Serialize};

/// Variant tag of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Race,
    Class,
    Specialization,
    RacialCompetence,
    EliteCompetence,
    Profession,
    Career,
    Faction,
    Guild,
    Item,
    ItemSet,
    Buff,
    GlobalRule,
}

impl EntityKind {
    /// Source priority used to order active modifiers. Lower values are
    /// more foundational and aggregate first.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use buildstat::EntityKind;
    ///
    /// assert_eq!(EntityKind::Race.priority(), 0);
    /// assert_eq!(EntityKind::Item.priority(), 4);
    /// assert!(EntityKind::Class.priority() < EntityKind::Specialization.priority());
    /// ```
    pub fn priority(self) -> u8 {
        match self {
            EntityKind::GlobalRule | EntityKind::Race => 0,
            EntityKind::Class => 1,
            EntityKind::Specialization => 2,
            EntityKind::Profession
            | EntityKind::Faction
            | EntityKind::Guild
            | EntityKind::ItemSet => 3,
            EntityKind::Item => 4,
            EntityKind::RacialCompetence
            | EntityKind::EliteCompetence
            | EntityKind::Career
            | EntityKind::Buff => 5,
        }
    }

    /// Flat modifiers from these kinds count as inherent base, not bonus.
    pub fn is_inherent(self) -> bool {
        matches!(
            self,
            EntityKind::Race
                | EntityKind::Class
                | EntityKind::GlobalRule
                | EntityKind::RacialCompetence
        )
    }
}

/// How a modifier combines with others on the same stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModifierKind {
    Flat,
    PercentAdd,
    PercentMultiPre,
    FinalAdditivePercent,
    AltFlat,
    AltPercent,
    Override,
}

impl ModifierKind {
    pub fn is_percent(self) -> bool {
        matches!(
            self,
            ModifierKind::PercentAdd
                | ModifierKind::PercentMultiPre
                | ModifierKind::FinalAdditivePercent
                | ModifierKind::AltPercent
        )
    }
}

impl std::fmt::Display for ModifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModifierKind::Flat => "FLAT",
            ModifierKind::PercentAdd => "PERCENT_ADD",
            ModifierKind::PercentMultiPre => "PERCENT_MULTI_PRE",
            ModifierKind::FinalAdditivePercent => "FINAL_ADDITIVE_PERCENT",
            ModifierKind::AltFlat => "ALT_FLAT",
            ModifierKind::AltPercent => "ALT_PERCENT",
            ModifierKind::Override => "OVERRIDE",
        };
        f.write_str(name)
    }
}

/// Accepts either a JSON string or a JSON number as formula text.
fn formula_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(f64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

fn zero_formula() -> String {
    "0".to_string()
}

/// A single formula-valued effect on one stat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifier {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ModifierKind,
    #[serde(rename = "targetStatKey")]
    pub target: StatKey,
    #[serde(deserialize_with = "formula_text")]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toggle_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toggle_name: Option<String>,
    /// Toggles sharing a group are mutually exclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toggle_group: Option<String>,
    #[serde(default, rename = "isPerTurn")]
    pub per_turn: bool,
    /// Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_with_team: Option<f64>,
    /// Free text; fusion ingredients are tagged here as `[Name]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Modifier {
    pub fn new(
        id: impl Into<String>,
        kind: ModifierKind,
        target: impl Into<StatKey>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            target: target.into(),
            value: value.into(),
            condition: None,
            toggle_id: None,
            toggle_name: None,
            toggle_group: None,
            per_turn: false,
            share_with_team: None,
            label: None,
        }
    }

    pub fn flat(id: impl Into<String>, target: impl Into<StatKey>, value: impl Into<String>) -> Self {
        Self::new(id, ModifierKind::Flat, target, value)
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn toggled(mut self, toggle_id: impl Into<String>) -> Self {
        self.toggle_id = Some(toggle_id.into());
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.toggle_group = Some(group.into());
        self
    }

    pub fn per_turn(mut self) -> Self {
        self.per_turn = true;
        self
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Whether the label carries the `[ingredient]` tag.
    pub fn has_ingredient_tag(&self, ingredient: &str) -> bool {
        let tag = format!("[{}]", ingredient.to_lowercase());
        self.label
            .as_deref()
            .is_some_and(|l| l.to_lowercase().contains(&tag))
    }
}

/// Per-stat formulas of a static summon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummonStatFormulas {
    #[serde(default = "zero_formula", deserialize_with = "formula_text")]
    pub vit: String,
    #[serde(default = "zero_formula", deserialize_with = "formula_text")]
    pub spd: String,
    #[serde(default = "zero_formula", deserialize_with = "formula_text")]
    pub dmg: String,
}

impl Default for SummonStatFormulas {
    fn default() -> Self {
        Self {
            vit: zero_formula(),
            spd: zero_formula(),
            dmg: zero_formula(),
        }
    }
}

/// A static summon declared by an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummonSpec {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "formula_text")]
    pub count_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toggle_id: Option<String>,
    #[serde(default)]
    pub stats: SummonStatFormulas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummonMode {
    /// The share is split evenly between all units.
    SharedPool,
    /// Every unit receives the full share.
    FixedPerUnit,
}

fn default_shared_stats() -> Vec<StatKey> {
    vec![
        StatKey::new(keys::VIT),
        StatKey::new(keys::SPD),
        StatKey::new(keys::DMG),
    ]
}

/// A summon whose stats are a share of the player's resolved stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummonConfig {
    pub name: String,
    pub mode: SummonMode,
    #[serde(deserialize_with = "formula_text")]
    pub count_value: String,
    /// Percentage of each shared player stat.
    #[serde(deserialize_with = "formula_text")]
    pub share_percent: String,
    #[serde(default = "default_shared_stats")]
    pub stats: Vec<StatKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toggle_id: Option<String>,
}

/// A user-configurable numeric input exposed by an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemInput {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub default_value: f64,
}

/// Item-only attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    pub category: String,
    pub subcategory: String,
    pub tags: Vec<String>,
    pub cost: f64,
    pub cost_reduction: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_id: Option<String>,
    pub inputs: Vec<ItemInput>,
}

impl ItemData {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Self::default()
        }
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = subcategory.into();
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_faction(mut self, faction: impl Into<String>) -> Self {
        self.faction = Some(faction.into());
        self
    }

    pub fn with_set(mut self, set_id: impl Into<String>) -> Self {
        self.set_id = Some(set_id.into());
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, default_value: f64) -> Self {
        let key = key.into();
        self.inputs.push(ItemInput {
            label: key.clone(),
            key,
            default_value,
        });
        self
    }
}

/// A catalogue node that can carry modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub summons: Vec<SummonSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summon_config: Option<SummonConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemData>,
}

impl Entity {
    pub fn new(id: impl Into<String>, kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            parent_id: None,
            modifiers: Vec::new(),
            summons: Vec::new(),
            summon_config: None,
            description: None,
            item: None,
        }
    }

    /// An item entity with the given category.
    pub fn item(id: impl Into<String>, name: impl Into<String>, data: ItemData) -> Self {
        let mut entity = Self::new(id, EntityKind::Item, name);
        entity.item = Some(data);
        entity
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn with_summon(mut self, summon: SummonSpec) -> Self {
        self.summons.push(summon);
        self
    }

    pub fn with_summon_config(mut self, config: SummonConfig) -> Self {
        self.summon_config = Some(config);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(&self) -> &str {
        self.item.as_ref().map_or("", |i| i.category.as_str())
    }

    pub fn subcategory(&self) -> &str {
        self.item.as_ref().map_or("", |i| i.subcategory.as_str())
    }

    /// Modifiers of the given kind on `stat`.
    pub fn modifiers_on<'a>(
        &'a self,
        kind: ModifierKind,
        stat: &'a str,
    ) -> impl Iterator<Item = &'a Modifier> + 'a {
        self.modifiers
            .iter()
            .filter(move |m| m.kind == kind && m.target.matches(stat))
    }
}
