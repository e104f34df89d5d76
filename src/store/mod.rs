//! Graph Store Boundary
//!
//! The import pipeline only ever talks to the graph through [`GraphStore`].
//! [`neo4j::Neo4jStore`] is the production backend; [`memory::MemoryStore`]
//! honours the same contract in-process for dry runs and tests.

pub mod memory;
pub mod neo4j;

use crate::error::StoreError;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Labels and Relationship Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum NodeLabel {
    Person,
    Movie,
    Genre,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Person => "Person",
            NodeLabel::Movie => "Movie",
            NodeLabel::Genre => "Genre",
        }
    }

    /// Property carrying the unique key for this label
    pub fn key_property(&self) -> &'static str {
        match self {
            NodeLabel::Person => "person_tmdbId",
            NodeLabel::Movie => "movieId",
            NodeLabel::Genre => "name",
        }
    }

    pub fn constraint_name(&self) -> &'static str {
        match self {
            NodeLabel::Person => "person_tmdbId_Person_uniq",
            NodeLabel::Movie => "movieId_Movie_uniq",
            NodeLabel::Genre => "name_Genre_uniq",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RelType {
    ActedIn,
    Directed,
    InGenre,
}

impl RelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelType::ActedIn => "ACTED_IN",
            RelType::Directed => "DIRECTED",
            RelType::InGenre => "IN_GENRE",
        }
    }

    /// (source, target) labels
    pub fn endpoints(&self) -> (NodeLabel, NodeLabel) {
        match self {
            RelType::ActedIn | RelType::Directed => (NodeLabel::Person, NodeLabel::Movie),
            RelType::InGenre => (NodeLabel::Movie, NodeLabel::Genre),
        }
    }
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secondary person labels derived from relationships
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    Actor,
    Director,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Actor => "Actor",
            Role::Director => "Director",
        }
    }

    pub fn rel(&self) -> RelType {
        match self {
            Role::Actor => RelType::ActedIn,
            Role::Director => RelType::Directed,
        }
    }
}

// ============================================================================
// Property Values
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    Text(String),
    TextList(Vec<String>),
    Date(NaiveDate),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Text(v) => write!(f, "{:?}", v),
            PropertyValue::TextList(v) => write!(f, "{:?}", v),
            PropertyValue::Date(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(v: Vec<String>) -> Self {
        PropertyValue::TextList(v)
    }
}

impl From<NaiveDate> for PropertyValue {
    fn from(v: NaiveDate) -> Self {
        PropertyValue::Date(v)
    }
}

/// Property map for a node or edge. Absent optional values are simply not
/// inserted, so the store never sees a null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(BTreeMap<&'static str, PropertyValue>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl Into<PropertyValue>) -> Self {
        self.0.insert(key, value.into());
        self
    }

    pub fn with_opt<V: Into<PropertyValue>>(self, key: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &PropertyValue)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` into `self`, overwriting existing keys (Cypher `SET n += $props`)
    pub fn merge(&mut self, other: &Properties) {
        for (k, v) in other.iter() {
            self.0.insert(k, v.clone());
        }
    }
}

// ============================================================================
// Operation Inputs and Outcomes
// ============================================================================

/// Identifies a node by its label and unique key value
#[derive(Debug, Clone, PartialEq)]
pub struct NodeKey {
    pub label: NodeLabel,
    pub value: PropertyValue,
}

impl NodeKey {
    pub fn person(id: i64) -> Self {
        Self { label: NodeLabel::Person, value: PropertyValue::Int(id) }
    }

    pub fn movie(id: i64) -> Self {
        Self { label: NodeLabel::Movie, value: PropertyValue::Int(id) }
    }
}

/// A directed edge to create between two keyed nodes
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSpec {
    pub rel: RelType,
    pub source: NodeKey,
    pub target: NodeKey,
    pub properties: Properties,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    Created,
    SourceMissing,
    TargetMissing,
    BothMissing,
}

impl EdgeOutcome {
    pub fn from_matches(source_found: bool, target_found: bool) -> Self {
        match (source_found, target_found) {
            (true, true) => EdgeOutcome::Created,
            (false, true) => EdgeOutcome::SourceMissing,
            (true, false) => EdgeOutcome::TargetMissing,
            (false, false) => EdgeOutcome::BothMissing,
        }
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// Capabilities the import pipeline needs from a property-graph store.
#[allow(async_fn_in_trait)]
pub trait GraphStore {
    /// Delete every node and relationship.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Declare a uniqueness constraint on `label`'s key property. Re-declaring is a no-op.
    async fn ensure_unique_constraint(&self, label: NodeLabel) -> Result<(), StoreError>;

    async fn create_node(&self, label: NodeLabel, properties: &Properties) -> Result<(), StoreError>;

    /// Match both endpoints by key and create one edge between them if both exist.
    async fn create_edge(&self, edge: &EdgeSpec) -> Result<EdgeOutcome, StoreError>;

    /// Set properties on the node(s) matching `key`. Returns whether anything matched.
    async fn set_properties(&self, key: &NodeKey, properties: &Properties) -> Result<bool, StoreError>;

    async fn count_nodes(&self, label: NodeLabel) -> Result<i64, StoreError>;

    async fn count_edges(&self, rel: RelType) -> Result<i64, StoreError>;

    /// Merge a Genre node per distinct movie genre and link movies to them.
    /// Returns the number of movie-genre pairs processed.
    async fn link_genres(&self) -> Result<i64, StoreError>;

    /// Add the role's label to every person with at least one matching edge.
    async fn tag_role(&self, role: Role) -> Result<i64, StoreError>;

    async fn count_role(&self, role: Role) -> Result<i64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_skip_absent_values() {
        let props = Properties::new()
            .with("name", "Tom Hanks".to_string())
            .with_opt::<NaiveDate>("died", None)
            .with_opt("born", NaiveDate::from_ymd_opt(1956, 7, 9));

        assert_eq!(props.iter().count(), 2);
        assert!(props.get("died").is_none());
        assert!(matches!(props.get("born"), Some(PropertyValue::Date(_))));
    }

    #[test]
    fn test_properties_merge_overwrites() {
        let mut props = Properties::new().with("avgRating", 1.0).with("title", "Heat".to_string());
        props.merge(&Properties::new().with("avgRating", 4.5));

        assert_eq!(props.get("avgRating"), Some(&PropertyValue::Float(4.5)));
        assert_eq!(props.get("title"), Some(&PropertyValue::Text("Heat".to_string())));
    }

    #[test]
    fn test_edge_outcome_from_matches() {
        assert_eq!(EdgeOutcome::from_matches(true, true), EdgeOutcome::Created);
        assert_eq!(EdgeOutcome::from_matches(false, true), EdgeOutcome::SourceMissing);
        assert_eq!(EdgeOutcome::from_matches(true, false), EdgeOutcome::TargetMissing);
        assert_eq!(EdgeOutcome::from_matches(false, false), EdgeOutcome::BothMissing);
    }

    #[test]
    fn test_label_keys() {
        assert_eq!(NodeLabel::Person.key_property(), "person_tmdbId");
        assert_eq!(NodeLabel::Movie.key_property(), "movieId");
        assert_eq!(RelType::ActedIn.endpoints(), (NodeLabel::Person, NodeLabel::Movie));
        assert_eq!(Role::Director.rel(), RelType::Directed);
    }
}
