//! Content linting.
//!
//! Resolution swallows every content mistake (bad syntax evaluates to `0`,
//! unknown stats and functions are ignored). [`lint_catalogue`] reports them
//! instead, for authoring tools and CI.

use crate::catalogue::Catalogue;
use crate::entity::{Entity, EntityKind, Modifier};
use crate::formula::{
    analyze_formula_calls, analyze_formula_references, validate_formula_syntax, MATH_FUNCTIONS,
};
use crate::graph::StatGraph;
use crate::helpers::HELPER_NAMES;
use crate::stat_id::StatKey;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// One problem found in a catalogue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LintIssue {
    UnknownStat {
        entity: String,
        modifier: String,
        stat: String,
    },
    InvalidSyntax {
        entity: String,
        modifier: String,
        formula: String,
    },
    /// A call to a function that is neither an item helper nor a `Math` member.
    UnknownFunction {
        entity: String,
        modifier: String,
        function: String,
    },
    UnknownSet {
        entity: String,
        set_id: String,
    },
    /// Stats reading each other; three passes may not settle them.
    DependencyCycle { stats: Vec<String> },
}

impl fmt::Display for LintIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LintIssue::UnknownStat {
                entity,
                modifier,
                stat,
            } => write!(f, "{}/{}: unknown stat '{}'", entity, modifier, stat),
            LintIssue::InvalidSyntax {
                entity,
                modifier,
                formula,
            } => write!(f, "{}/{}: invalid formula '{}'", entity, modifier, formula),
            LintIssue::UnknownFunction {
                entity,
                modifier,
                function,
            } => write!(f, "{}/{}: unknown function '{}'", entity, modifier, function),
            LintIssue::UnknownSet { entity, set_id } => {
                write!(f, "{}: unknown item set '{}'", entity, set_id)
            }
            LintIssue::DependencyCycle { stats } => {
                write!(f, "dependency cycle: {}", stats.join(" <-> "))
            }
        }
    }
}

fn formulas(modifier: &Modifier) -> impl Iterator<Item = &str> {
    std::iter::once(modifier.value.as_str()).chain(modifier.condition.as_deref())
}

fn is_known_function(name: &str) -> bool {
    match name.split_once('.') {
        Some(("Math", method)) => MATH_FUNCTIONS.contains(&method),
        Some(_) => false,
        None => HELPER_NAMES.contains(&name),
    }
}

/// Map a formula identifier to the stat it reads, if any.
fn referenced_stat<'a>(ident: &str, stats: &HashMap<&str, &'a StatKey>) -> Option<&'a StatKey> {
    let bare = ident
        .strip_prefix("local_base_")
        .or_else(|| ident.strip_prefix("base_"))
        .unwrap_or(ident);
    stats.get(bare).copied()
}

/// Dependency graph of the catalogue's stats.
pub fn dependency_graph(catalogue: &Catalogue) -> StatGraph {
    let stats: HashMap<&str, &StatKey> = catalogue
        .stats
        .iter()
        .map(|s| (s.key.as_str(), &s.key))
        .collect();
    let mut graph = StatGraph::new();
    for stat in &catalogue.stats {
        graph.add_node(stat.key.clone());
    }
    for modifier in catalogue.entities.iter().flat_map(|e| e.modifiers.iter()) {
        let Some(&target) = stats.get(modifier.target.as_str()) else {
            continue;
        };
        for ident in formulas(modifier).flat_map(analyze_formula_references) {
            if let Some(read) = referenced_stat(&ident, &stats) {
                graph.add_edge(target.clone(), read.clone());
            }
        }
    }
    graph
}

fn lint_entity(entity: &Entity, catalogue: &Catalogue, issues: &mut Vec<LintIssue>) {
    for modifier in &entity.modifiers {
        if catalogue.stat(modifier.target.as_str()).is_none() {
            issues.push(LintIssue::UnknownStat {
                entity: entity.id.clone(),
                modifier: modifier.id.clone(),
                stat: modifier.target.to_string(),
            });
        }
        for formula in formulas(modifier).filter(|f| !validate_formula_syntax(f)) {
            issues.push(LintIssue::InvalidSyntax {
                entity: entity.id.clone(),
                modifier: modifier.id.clone(),
                formula: formula.to_string(),
            });
        }
        let unknown = formulas(modifier)
            .flat_map(analyze_formula_calls)
            .filter(|name| !is_known_function(name))
            .collect::<BTreeSet<_>>();
        for function in unknown {
            issues.push(LintIssue::UnknownFunction {
                entity: entity.id.clone(),
                modifier: modifier.id.clone(),
                function,
            });
        }
    }
    let set_id = entity.item.as_ref().and_then(|i| i.set_id.as_deref());
    if let Some(set_id) = set_id {
        let known = catalogue
            .entity(set_id)
            .is_some_and(|s| s.kind == EntityKind::ItemSet);
        if !known {
            issues.push(LintIssue::UnknownSet {
                entity: entity.id.clone(),
                set_id: set_id.to_string(),
            });
        }
    }
}

/// Every problem found in `catalogue`, in entity order, cycles last.
///
/// # Examples
///
/// ```rust
/// use buildstat::diagnostics::{lint_catalogue, LintIssue};
/// use buildstat::entity::{Entity, EntityKind, Modifier};
/// use buildstat::{Catalogue, StatDefinition};
///
/// let catalogue = Catalogue::new(
///     vec![StatDefinition::new("vit", 100.0)],
///     vec![Entity::new("elf", EntityKind::Race, "Elf")
///         .with_modifier(Modifier::flat("elf_mana", "mana", "10"))],
/// ).unwrap();
///
/// let issues = lint_catalogue(&catalogue);
/// assert!(matches!(&issues[0], LintIssue::UnknownStat { stat, .. } if stat == "mana"));
/// ```
pub fn lint_catalogue(catalogue: &Catalogue) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    for entity in &catalogue.entities {
        lint_entity(entity, catalogue, &mut issues);
    }
    for cycle in dependency_graph(catalogue).cycles() {
        issues.push(LintIssue::DependencyCycle {
            stats: cycle.iter().map(|k| k.to_string()).collect(),
        });
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ItemData;
    use crate::stat_def::StatDefinition;

    fn stats() -> Vec<StatDefinition> {
        vec![
            StatDefinition::new("vit", 100.0),
            StatDefinition::new("dmg", 10.0),
        ]
    }

    #[test]
    fn test_clean_catalogue() {
        let catalogue = Catalogue::new(
            stats(),
            vec![Entity::new("orc", EntityKind::Race, "Orc")
                .with_modifier(Modifier::flat("o", "dmg", "base_vit * 0.1"))],
        )
        .unwrap();
        assert!(lint_catalogue(&catalogue).is_empty());
    }

    #[test]
    fn test_syntax_and_condition_errors() {
        let catalogue = Catalogue::new(
            stats(),
            vec![Entity::new("orc", EntityKind::Race, "Orc")
                .with_modifier(Modifier::flat("o", "dmg", "(1 +").when("level >"))],
        )
        .unwrap();
        let issues = lint_catalogue(&catalogue);
        assert_eq!(issues.len(), 2);
        assert!(issues
            .iter()
            .all(|i| matches!(i, LintIssue::InvalidSyntax { .. })));
    }

    #[test]
    fn test_unknown_function_reported() {
        let catalogue = Catalogue::new(
            stats(),
            vec![Entity::new("orc", EntityKind::Race, "Orc")
                .with_modifier(Modifier::flat("o", "dmg", "itemFlatt('axe') + countItems('axe')"))
                .with_modifier(
                    Modifier::flat("p", "vit", "Math.max(1, level)").when("Math.clamp(level) > 2"),
                )],
        )
        .unwrap();
        let issues = lint_catalogue(&catalogue);
        assert_eq!(
            issues,
            vec![
                LintIssue::UnknownFunction {
                    entity: "orc".into(),
                    modifier: "o".into(),
                    function: "itemFlatt".into(),
                },
                LintIssue::UnknownFunction {
                    entity: "orc".into(),
                    modifier: "p".into(),
                    function: "Math.clamp".into(),
                },
            ]
        );
        assert_eq!(issues[0].to_string(), "orc/o: unknown function 'itemFlatt'");
    }

    #[test]
    fn test_every_helper_is_known() {
        for name in HELPER_NAMES {
            assert!(is_known_function(name));
        }
        assert!(is_known_function("Math.pow"));
        assert!(!is_known_function("Foo.max"));
    }

    #[test]
    fn test_unknown_set() {
        let helm = Entity::item("helm", "Helm", ItemData::new("armor").with_set("ghost_set"));
        let catalogue = Catalogue::new(stats(), vec![helm]).unwrap();
        assert_eq!(
            lint_catalogue(&catalogue),
            vec![LintIssue::UnknownSet {
                entity: "helm".into(),
                set_id: "ghost_set".into(),
            }]
        );
    }

    #[test]
    fn test_cycle_reported() {
        let catalogue = Catalogue::new(
            stats(),
            vec![Entity::new("orc", EntityKind::Race, "Orc")
                .with_modifier(Modifier::flat("a", "dmg", "vit / 10"))
                .with_modifier(Modifier::flat("b", "vit", "local_base_dmg * 2"))],
        )
        .unwrap();
        let issues = lint_catalogue(&catalogue);
        assert_eq!(
            issues,
            vec![LintIssue::DependencyCycle {
                stats: vec!["dmg".into(), "vit".into()],
            }]
        );
        assert_eq!(issues[0].to_string(), "dependency cycle: dmg <-> vit");
    }

    #[test]
    fn test_graph_ignores_non_stat_identifiers() {
        let catalogue = Catalogue::new(
            stats(),
            vec![Entity::new("orc", EntityKind::Race, "Orc")
                .with_modifier(Modifier::flat("a", "dmg", "level * countItems('sword')"))],
        )
        .unwrap();
        let graph = dependency_graph(&catalogue);
        assert!(graph.dependencies_of(&StatKey::new("dmg")).is_empty());
    }
}
