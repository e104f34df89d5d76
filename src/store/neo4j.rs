//! Neo4j Storage
//!
//! Per-record Cypher operations over a single long-lived `neo4rs::Graph`.
//! Labels and relationship types cannot be query parameters, so they are
//! formatted in from the closed [`NodeLabel`]/[`RelType`] enums; every value
//! goes through a parameter.

use super::{EdgeOutcome, EdgeSpec, GraphStore, NodeKey, NodeLabel, Properties, PropertyValue, RelType, Role};
use crate::error::StoreError;
use neo4rs::{query, BoltType, Graph, Query, Row};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::info;

// ============================================================================
// Helper: Convert to BoltType-compatible HashMap
// ============================================================================

type BoltMap = HashMap<String, BoltType>;

fn to_bolt(value: &PropertyValue) -> BoltType {
    match value {
        PropertyValue::Int(v) => (*v).into(),
        PropertyValue::Float(v) => (*v).into(),
        PropertyValue::Text(v) => v.clone().into(),
        PropertyValue::TextList(v) => v.clone().into(),
        PropertyValue::Date(v) => (*v).into(),
    }
}

fn properties_to_map(properties: &Properties) -> BoltMap {
    properties
        .iter()
        .map(|(k, v)| (k.to_string(), to_bolt(v)))
        .collect()
}

fn decode<T: DeserializeOwned>(row: &Row, column: &'static str) -> Result<T, StoreError> {
    row.get(column).map_err(|e| StoreError::Decode {
        column,
        message: e.to_string(),
    })
}

// ============================================================================
// Cypher Builders
// ============================================================================

fn constraint_cypher(label: NodeLabel) -> String {
    format!(
        "CREATE CONSTRAINT {name} IF NOT EXISTS
         FOR (n:{label}) REQUIRE n.{key} IS UNIQUE",
        name = label.constraint_name(),
        label = label.as_str(),
        key = label.key_property(),
    )
}

fn create_node_query(label: NodeLabel, properties: &Properties) -> Query {
    query(&format!("CREATE (n:{} $props)", label.as_str()))
        .param("props", properties_to_map(properties))
}

fn create_edge_query(edge: &EdgeSpec) -> Query {
    let props = if edge.properties.is_empty() { "" } else { " $props" };
    let cypher = format!(
        "OPTIONAL MATCH (a:{source} {{{source_key}: $source}})
         OPTIONAL MATCH (b:{target} {{{target_key}: $target}})
         FOREACH (_ IN CASE WHEN a IS NOT NULL AND b IS NOT NULL THEN [1] ELSE [] END |
             CREATE (a)-[:{rel}{props}]->(b))
         RETURN a IS NOT NULL AS source_found, b IS NOT NULL AS target_found",
        source = edge.source.label.as_str(),
        source_key = edge.source.label.key_property(),
        target = edge.target.label.as_str(),
        target_key = edge.target.label.key_property(),
        rel = edge.rel.as_str(),
    );
    let q = query(&cypher)
        .param("source", to_bolt(&edge.source.value))
        .param("target", to_bolt(&edge.target.value));
    if edge.properties.is_empty() {
        q
    } else {
        q.param("props", properties_to_map(&edge.properties))
    }
}

fn set_properties_query(key: &NodeKey, properties: &Properties) -> Query {
    let cypher = format!(
        "MATCH (n:{label} {{{key}: $key}})
         SET n += $props
         RETURN count(n) AS matched",
        label = key.label.as_str(),
        key = key.label.key_property(),
    );
    query(&cypher)
        .param("key", to_bolt(&key.value))
        .param("props", properties_to_map(properties))
}

fn count_edges_cypher(rel: RelType) -> String {
    let (source, target) = rel.endpoints();
    format!(
        "MATCH (:{})-[r:{}]->(:{}) RETURN count(r) AS count",
        source.as_str(),
        rel.as_str(),
        target.as_str()
    )
}

fn tag_role_cypher(role: Role) -> String {
    format!(
        "MATCH (p:Person)-[:{}]->()
         WITH DISTINCT p SET p:{}
         RETURN count(p) AS count",
        role.rel().as_str(),
        role.label()
    )
}

const LINK_GENRES_CYPHER: &str = "MATCH (m:Movie)
     UNWIND m.genres AS genreName
     WITH m, trim(genreName) AS genreName
     WHERE genreName <> ''
     MERGE (g:Genre {name: genreName})
     MERGE (m)-[:IN_GENRE]->(g)
     RETURN count(*) AS count";

// ============================================================================
// Store
// ============================================================================

/// Neo4j-backed [`GraphStore`]. The connection pool is released on drop.
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    async fn fetch_i64(&self, q: Query, column: &'static str) -> Result<i64, StoreError> {
        let mut stream = self.graph.execute(q).await?;
        let row = stream.next().await?.ok_or(StoreError::EmptyResult)?;
        decode(&row, column)
    }
}

impl Drop for Neo4jStore {
    fn drop(&mut self) {
        info!("🔌 Releasing Neo4j connection");
    }
}

impl GraphStore for Neo4jStore {
    async fn clear(&self) -> Result<(), StoreError> {
        self.graph.run(query("MATCH (n) DETACH DELETE n")).await?;
        Ok(())
    }

    async fn ensure_unique_constraint(&self, label: NodeLabel) -> Result<(), StoreError> {
        self.graph.run(query(&constraint_cypher(label))).await?;
        Ok(())
    }

    async fn create_node(&self, label: NodeLabel, properties: &Properties) -> Result<(), StoreError> {
        self.graph.run(create_node_query(label, properties)).await?;
        Ok(())
    }

    async fn create_edge(&self, edge: &EdgeSpec) -> Result<EdgeOutcome, StoreError> {
        let mut stream = self.graph.execute(create_edge_query(edge)).await?;
        let row = stream.next().await?.ok_or(StoreError::EmptyResult)?;

        let source_found: bool = decode(&row, "source_found")?;
        let target_found: bool = decode(&row, "target_found")?;

        Ok(EdgeOutcome::from_matches(source_found, target_found))
    }

    async fn set_properties(&self, key: &NodeKey, properties: &Properties) -> Result<bool, StoreError> {
        let matched = self
            .fetch_i64(set_properties_query(key, properties), "matched")
            .await?;
        Ok(matched > 0)
    }

    async fn count_nodes(&self, label: NodeLabel) -> Result<i64, StoreError> {
        let cypher = format!("MATCH (n:{}) RETURN count(n) AS count", label.as_str());
        self.fetch_i64(query(&cypher), "count").await
    }

    async fn count_edges(&self, rel: RelType) -> Result<i64, StoreError> {
        self.fetch_i64(query(&count_edges_cypher(rel)), "count").await
    }

    async fn link_genres(&self) -> Result<i64, StoreError> {
        self.fetch_i64(query(LINK_GENRES_CYPHER), "count").await
    }

    async fn tag_role(&self, role: Role) -> Result<i64, StoreError> {
        self.fetch_i64(query(&tag_role_cypher(role)), "count").await
    }

    async fn count_role(&self, role: Role) -> Result<i64, StoreError> {
        let cypher = format!("MATCH (p:{}) RETURN count(p) AS count", role.label());
        self.fetch_i64(query(&cypher), "count").await
    }
}
