//! Stat dependency graph.
//!
//! Provides the `StatGraph` type: which stats read which other stats through
//! modifier formulas. Resolution does not use it (passes run a fixed number
//! of times); content tooling does, to find feedback loops that a fixed pass
//! budget may leave unconverged.

use crate::stat_id::StatKey;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// A directed graph of stat dependencies.
///
/// An edge from `a` to `b` means a modifier on `a` reads `b`.
///
/// # Examples
///
/// ```rust
/// use buildstat::graph::StatGraph;
/// use buildstat::StatKey;
///
/// let mut graph = StatGraph::new();
/// let vit = StatKey::new("vit");
/// let dmg = StatKey::new("dmg");
///
/// graph.add_edge(dmg.clone(), vit.clone());
/// assert!(graph.cycles().is_empty());
///
/// graph.add_edge(vit.clone(), dmg.clone());
/// assert_eq!(graph.cycles().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StatGraph {
    graph: DiGraph<StatKey, ()>,
    node_map: HashMap<StatKey, NodeIndex>,
}

impl StatGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if missing and return its index.
    pub fn add_node(&mut self, key: StatKey) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(key.clone());
        self.node_map.insert(key, idx);
        idx
    }

    /// Record that `from` reads `to`. Repeated edges are collapsed.
    pub fn add_edge(&mut self, from: StatKey, to: StatKey) {
        let from_idx = self.add_node(from);
        let to_idx = self.add_node(to);
        self.graph.update_edge(from_idx, to_idx, ());
    }

    pub fn contains_node(&self, key: &StatKey) -> bool {
        self.node_map.contains_key(key)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Stats read by `key`, sorted.
    pub fn dependencies_of(&self, key: &StatKey) -> Vec<StatKey> {
        let Some(&idx) = self.node_map.get(key) else {
            return Vec::new();
        };
        let mut deps: Vec<StatKey> = self
            .graph
            .neighbors(idx)
            .map(|n| self.graph[n].clone())
            .collect();
        deps.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        deps
    }

    /// Every dependency loop, as the sorted set of stats it involves.
    /// A stat reading itself is a loop of one. Loops are sorted by their
    /// first member.
    pub fn cycles(&self) -> Vec<Vec<StatKey>> {
        let mut loops: Vec<Vec<StatKey>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&n| self.graph.contains_edge(n, n))
            })
            .map(|component| {
                let mut keys: Vec<StatKey> =
                    component.into_iter().map(|n| self.graph[n].clone()).collect();
                keys.sort_by(|a, b| a.as_str().cmp(b.as_str()));
                keys
            })
            .collect();
        loops.sort_by(|a, b| a[0].as_str().cmp(b[0].as_str()));
        loops
    }

    /// Stats ordered dependencies first, or `None` when a loop exists.
    pub fn resolution_order(&self) -> Option<Vec<StatKey>> {
        let order = toposort(&self.graph, None).ok()?;
        Some(order.into_iter().rev().map(|n| self.graph[n].clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> StatKey {
        StatKey::new(s)
    }

    #[test]
    fn test_duplicate_nodes_and_edges() {
        let mut graph = StatGraph::new();
        assert_eq!(graph.add_node(key("vit")), graph.add_node(key("vit")));
        graph.add_edge(key("dmg"), key("vit"));
        graph.add_edge(key("dmg"), key("vit"));
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.dependencies_of(&key("dmg")), vec![key("vit")]);
    }

    #[test]
    fn test_self_loop() {
        let mut graph = StatGraph::new();
        graph.add_edge(key("vit"), key("vit"));
        assert_eq!(graph.cycles(), vec![vec![key("vit")]]);
        assert!(graph.resolution_order().is_none());
    }

    #[test]
    fn test_cycle_excludes_feeders() {
        let mut graph = StatGraph::new();
        // x -> a -> b -> c -> a
        graph.add_edge(key("x"), key("a"));
        graph.add_edge(key("a"), key("b"));
        graph.add_edge(key("b"), key("c"));
        graph.add_edge(key("c"), key("a"));
        assert_eq!(graph.cycles(), vec![vec![key("a"), key("b"), key("c")]]);
    }

    #[test]
    fn test_independent_cycles_sorted() {
        let mut graph = StatGraph::new();
        graph.add_edge(key("spd"), key("res"));
        graph.add_edge(key("res"), key("spd"));
        graph.add_edge(key("aura"), key("dmg"));
        graph.add_edge(key("dmg"), key("aura"));
        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0][0], key("aura"));
    }

    #[test]
    fn test_resolution_order() {
        let mut graph = StatGraph::new();
        graph.add_edge(key("dps"), key("dmg"));
        graph.add_edge(key("dmg"), key("str"));
        let order = graph.resolution_order().unwrap();
        let pos = |k: &str| order.iter().position(|s| s.as_str() == k).unwrap();
        assert!(pos("str") < pos("dmg"));
        assert!(pos("dmg") < pos("dps"));
    }
}
