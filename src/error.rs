//! Error types for the import pipeline.
//!
//! Fatal errors (connection, schema, unreadable source files) travel as
//! `anyhow::Error`. Everything that can go wrong with a single CSV row is a
//! [`RecordError`] and is classified into one [`FailureKind`].

use crate::store::{NodeLabel, RelType};
use serde::Serialize;

/// Errors raised by a [`crate::store::GraphStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Neo4j error: {0}")]
    Neo4j(#[from] neo4rs::Error),

    #[error("Failed to decode column `{column}`: {message}")]
    Decode { column: &'static str, message: String },

    #[error("Query returned no rows")]
    EmptyResult,

    #[error("{label} node with {key} = {value} already exists")]
    ConstraintViolation {
        label: NodeLabel,
        key: &'static str,
        value: String,
    },
}

/// Field coercion failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoerceError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not a valid {expected}: {value:?}")]
    InvalidNumber {
        field: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Which side of a relationship could not be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingEnd {
    Source,
    Target,
    Both,
}

impl std::fmt::Display for MissingEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MissingEnd::Source => "source",
            MissingEnd::Target => "target",
            MissingEnd::Both => "source and target",
        };
        f.write_str(s)
    }
}

/// A failure confined to one source record.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("unreadable row: {0}")]
    Row(#[from] csv::Error),

    #[error("malformed record: {0}")]
    Coerce(#[from] CoerceError),

    #[error("{rel} {source_key} -> {target_key}: {missing} node not found")]
    MissingEndpoint {
        rel: RelType,
        source_key: i64,
        target_key: i64,
        missing: MissingEnd,
    },

    #[error("store rejected record: {0}")]
    Store(#[from] StoreError),
}

/// The closed set of per-record failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Parse,
    MissingEndpoint,
    StoreRejected,
}

impl RecordError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RecordError::Row(_) | RecordError::Coerce(_) => FailureKind::Parse,
            RecordError::MissingEndpoint { .. } => FailureKind::MissingEndpoint,
            RecordError::Store(_) => FailureKind::StoreRejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_error_classification() {
        let parse = RecordError::from(CoerceError::MissingField("movieId"));
        assert_eq!(parse.kind(), FailureKind::Parse);

        let missing = RecordError::MissingEndpoint {
            rel: RelType::ActedIn,
            source_key: 99,
            target_key: 10,
            missing: MissingEnd::Source,
        };
        assert_eq!(missing.kind(), FailureKind::MissingEndpoint);
        assert_eq!(
            missing.to_string(),
            "ACTED_IN 99 -> 10: source node not found"
        );

        let rejected = RecordError::from(StoreError::ConstraintViolation {
            label: NodeLabel::Person,
            key: "person_tmdbId",
            value: "1".to_string(),
        });
        assert_eq!(rejected.kind(), FailureKind::StoreRejected);
    }
}
