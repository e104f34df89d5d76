//! In-process graph store.
//!
//! Mirrors the Neo4j semantics the pipeline relies on: uniqueness constraints
//! reject duplicate keys, edges are only created between matched nodes, and
//! `SET` touches every node matching a key.

use super::{EdgeOutcome, EdgeSpec, GraphStore, NodeKey, NodeLabel, Properties, PropertyValue, RelType, Role};
use crate::error::StoreError;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct MemoryNode {
    labels: BTreeSet<&'static str>,
    properties: Properties,
}

impl MemoryNode {
    fn matches(&self, key: &NodeKey) -> bool {
        self.labels.contains(key.label.as_str())
            && self.properties.get(key.label.key_property()) == Some(&key.value)
    }
}

#[derive(Debug)]
struct MemoryEdge {
    rel: RelType,
    source: usize,
    target: usize,
    properties: Properties,
}

#[derive(Debug, Default)]
struct MemoryGraph {
    nodes: Vec<MemoryNode>,
    edges: Vec<MemoryEdge>,
    constraints: BTreeSet<NodeLabel>,
}

impl MemoryGraph {
    fn find(&self, key: &NodeKey) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.matches(key))
            .map(|(i, _)| i)
            .collect()
    }

    fn merge_node(&mut self, key: NodeKey) -> usize {
        if let Some(idx) = self.find(&key).into_iter().next() {
            return idx;
        }
        let properties = Properties::new().with(key.label.key_property(), key.value);
        self.nodes.push(MemoryNode {
            labels: BTreeSet::from([key.label.as_str()]),
            properties,
        });
        self.nodes.len() - 1
    }

    fn merge_edge(&mut self, rel: RelType, source: usize, target: usize) {
        let exists = self
            .edges
            .iter()
            .any(|e| e.rel == rel && e.source == source && e.target == target);
        if !exists {
            self.edges.push(MemoryEdge { rel, source, target, properties: Properties::new() });
        }
    }
}

/// Graph store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    graph: Mutex<MemoryGraph>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn graph(&self) -> MutexGuard<'_, MemoryGraph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Properties of the first node matching `key`
    #[cfg(test)]
    pub fn node(&self, key: &NodeKey) -> Option<Properties> {
        let graph = self.graph();
        graph.nodes.iter().find(|n| n.matches(key)).map(|n| n.properties.clone())
    }

    /// Properties of the first `rel` edge from `source` to `target`
    #[cfg(test)]
    pub fn edge(&self, rel: RelType, source: &NodeKey, target: &NodeKey) -> Option<Properties> {
        let graph = self.graph();
        graph
            .edges
            .iter()
            .find(|e| {
                e.rel == rel && graph.nodes[e.source].matches(source) && graph.nodes[e.target].matches(target)
            })
            .map(|e| e.properties.clone())
    }

    #[cfg(test)]
    pub fn constraint_count(&self) -> usize {
        self.graph().constraints.len()
    }

    #[cfg(test)]
    pub fn total_nodes(&self) -> usize {
        self.graph().nodes.len()
    }

    #[cfg(test)]
    pub fn total_edges(&self) -> usize {
        self.graph().edges.len()
    }
}

impl GraphStore for MemoryStore {
    async fn clear(&self) -> Result<(), StoreError> {
        let mut graph = self.graph();
        graph.nodes.clear();
        graph.edges.clear();
        Ok(())
    }

    async fn ensure_unique_constraint(&self, label: NodeLabel) -> Result<(), StoreError> {
        self.graph().constraints.insert(label);
        Ok(())
    }

    async fn create_node(&self, label: NodeLabel, properties: &Properties) -> Result<(), StoreError> {
        let mut graph = self.graph();

        if graph.constraints.contains(&label) {
            if let Some(value) = properties.get(label.key_property()) {
                let key = NodeKey { label, value: value.clone() };
                if !graph.find(&key).is_empty() {
                    return Err(StoreError::ConstraintViolation {
                        label,
                        key: label.key_property(),
                        value: value.to_string(),
                    });
                }
            }
        }

        graph.nodes.push(MemoryNode {
            labels: BTreeSet::from([label.as_str()]),
            properties: properties.clone(),
        });
        Ok(())
    }

    async fn create_edge(&self, edge: &EdgeSpec) -> Result<EdgeOutcome, StoreError> {
        let mut graph = self.graph();
        let sources = graph.find(&edge.source);
        let targets = graph.find(&edge.target);

        let outcome = EdgeOutcome::from_matches(!sources.is_empty(), !targets.is_empty());
        if outcome != EdgeOutcome::Created {
            return Ok(outcome);
        }

        // Cartesian product, same as MATCH (a) MATCH (b) CREATE (a)-[]->(b)
        for &source in &sources {
            for &target in &targets {
                graph.edges.push(MemoryEdge {
                    rel: edge.rel,
                    source,
                    target,
                    properties: edge.properties.clone(),
                });
            }
        }
        Ok(outcome)
    }

    async fn set_properties(&self, key: &NodeKey, properties: &Properties) -> Result<bool, StoreError> {
        let mut graph = self.graph();
        let mut matched = false;
        for node in graph.nodes.iter_mut().filter(|n| n.matches(key)) {
            node.properties.merge(properties);
            matched = true;
        }
        Ok(matched)
    }

    async fn count_nodes(&self, label: NodeLabel) -> Result<i64, StoreError> {
        let graph = self.graph();
        let count = graph
            .nodes
            .iter()
            .filter(|n| n.labels.contains(label.as_str()))
            .count();
        Ok(count as i64)
    }

    async fn count_edges(&self, rel: RelType) -> Result<i64, StoreError> {
        let graph = self.graph();
        let (source_label, target_label) = rel.endpoints();
        let count = graph
            .edges
            .iter()
            .filter(|e| e.rel == rel)
            .filter(|e| {
                graph.nodes[e.source].labels.contains(source_label.as_str())
                    && graph.nodes[e.target].labels.contains(target_label.as_str())
            })
            .count();
        Ok(count as i64)
    }

    async fn link_genres(&self) -> Result<i64, StoreError> {
        let mut graph = self.graph();

        let mut pairs = Vec::new();
        for (idx, node) in graph.nodes.iter().enumerate() {
            if !node.labels.contains(NodeLabel::Movie.as_str()) {
                continue;
            }
            if let Some(PropertyValue::TextList(genres)) = node.properties.get("genres") {
                for genre in genres {
                    let name = genre.trim();
                    if !name.is_empty() {
                        pairs.push((idx, name.to_string()));
                    }
                }
            }
        }

        let linked = pairs.len() as i64;
        for (movie, name) in pairs {
            let genre = graph.merge_node(NodeKey {
                label: NodeLabel::Genre,
                value: PropertyValue::Text(name),
            });
            graph.merge_edge(RelType::InGenre, movie, genre);
        }
        Ok(linked)
    }

    async fn tag_role(&self, role: Role) -> Result<i64, StoreError> {
        let mut graph = self.graph();
        let people: BTreeSet<usize> = graph
            .edges
            .iter()
            .filter(|e| e.rel == role.rel())
            .map(|e| e.source)
            .filter(|&idx| graph.nodes[idx].labels.contains(NodeLabel::Person.as_str()))
            .collect();

        for &idx in &people {
            graph.nodes[idx].labels.insert(role.label());
        }
        Ok(people.len() as i64)
    }

    async fn count_role(&self, role: Role) -> Result<i64, StoreError> {
        let graph = self.graph();
        let count = graph
            .nodes
            .iter()
            .filter(|n| n.labels.contains(role.label()))
            .count();
        Ok(count as i64)
    }
}
