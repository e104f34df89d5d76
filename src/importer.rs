//! Record Importers
//!
//! Each importer walks one CSV source in order, issues one store operation per
//! record and never lets a per-record failure escape: failures are classified,
//! logged with enough context to find the row, and counted.

use crate::error::{FailureKind, MissingEnd, RecordError};
use crate::records::{read_rows, EntityRow, RatingRow, RelationshipRow};
use crate::store::{EdgeOutcome, EdgeSpec, GraphStore, PropertyValue};
use serde::Serialize;
use std::io::Read;
use tracing::{info, warn};

// ============================================================================
// Reporting
// ============================================================================

/// Per-kind failure counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailureCounts {
    pub parse: u64,
    pub missing_endpoint: u64,
    pub store_rejected: u64,
}

impl FailureCounts {
    pub fn record(&mut self, kind: FailureKind) {
        match kind {
            FailureKind::Parse => self.parse += 1,
            FailureKind::MissingEndpoint => self.missing_endpoint += 1,
            FailureKind::StoreRejected => self.store_rejected += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.parse + self.missing_endpoint + self.store_rejected
    }
}

/// Outcome of one import phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub phase: &'static str,
    /// Records that produced a node, an edge, or an update
    pub succeeded: u64,
    /// Ratings only: well-formed records whose movie does not exist
    pub unmatched: u64,
    pub failures: FailureCounts,
}

impl PhaseReport {
    fn new(phase: &'static str) -> Self {
        Self {
            phase,
            succeeded: 0,
            unmatched: 0,
            failures: FailureCounts::default(),
        }
    }

    pub fn failed(&self) -> u64 {
        self.failures.total()
    }

    fn fail(&mut self, context: &str, err: &RecordError) {
        self.failures.record(err.kind());
        warn!("  ⚠️  {}: skipping {}: {}", self.phase, context, err);
    }
}

/// Emit a progress line every `every` successes (0 disables)
fn tick(report: &PhaseReport, every: u64, verb: &str) {
    if every > 0 && report.succeeded % every == 0 {
        info!("   {} {} {}...", verb, report.succeeded, report.phase);
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Create one node per row of `source`.
pub async fn import_entities<T, S, R>(
    store: &S,
    source: R,
    phase: &'static str,
    progress_every: u64,
) -> PhaseReport
where
    T: EntityRow,
    S: GraphStore,
    R: Read,
{
    info!("📥 Importing {} nodes...", T::LABEL);
    let mut report = PhaseReport::new(phase);

    for (idx, row) in read_rows::<R, T>(source).enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                report.fail(&format!("row {}", idx + 1), &RecordError::from(e));
                continue;
            }
        };

        let name = row.display_name();
        match create_entity(store, row).await {
            Ok(()) => {
                report.succeeded += 1;
                tick(&report, progress_every, "Imported");
            }
            Err(e) => report.fail(&format!("{} {:?}", T::LABEL, name), &e),
        }
    }

    info!("✅ Imported {} {} nodes (failed: {})", report.succeeded, T::LABEL, report.failed());
    report
}

async fn create_entity<T: EntityRow, S: GraphStore>(store: &S, row: T) -> Result<(), RecordError> {
    let properties = row.into_properties()?;
    store.create_node(T::LABEL, &properties).await?;
    Ok(())
}

// ============================================================================
// Relationships
// ============================================================================

/// Create one edge per row of `source`. Rows whose endpoints are missing are
/// counted as failures.
pub async fn import_relationships<T, S, R>(
    store: &S,
    source: R,
    phase: &'static str,
    progress_every: u64,
) -> PhaseReport
where
    T: RelationshipRow,
    S: GraphStore,
    R: Read,
{
    info!("🔗 Importing {} relationships...", T::REL);
    let mut report = PhaseReport::new(phase);

    for (idx, row) in read_rows::<R, T>(source).enumerate() {
        let context = format!("row {}", idx + 1);
        let result = match row {
            Ok(row) => create_relationship(store, row).await,
            Err(e) => Err(RecordError::from(e)),
        };

        match result {
            Ok(()) => {
                report.succeeded += 1;
                tick(&report, progress_every, "Created");
            }
            Err(e) => report.fail(&context, &e),
        }
    }

    info!(
        "✅ Created {} {} relationships (failed: {})",
        report.succeeded,
        T::REL,
        report.failed()
    );
    report
}

async fn create_relationship<T: RelationshipRow, S: GraphStore>(
    store: &S,
    row: T,
) -> Result<(), RecordError> {
    let edge = row.into_edge()?;
    let missing = match store.create_edge(&edge).await? {
        EdgeOutcome::Created => return Ok(()),
        EdgeOutcome::SourceMissing => MissingEnd::Source,
        EdgeOutcome::TargetMissing => MissingEnd::Target,
        EdgeOutcome::BothMissing => MissingEnd::Both,
    };
    Err(missing_endpoint(&edge, missing))
}

fn missing_endpoint(edge: &EdgeSpec, missing: MissingEnd) -> RecordError {
    let key = |value: &PropertyValue| match value {
        PropertyValue::Int(v) => *v,
        _ => 0,
    };
    RecordError::MissingEndpoint {
        rel: edge.rel,
        source_key: key(&edge.source.value),
        target_key: key(&edge.target.value),
        missing,
    }
}

// ============================================================================
// Ratings
// ============================================================================

/// Set aggregate rating fields on existing movies. Unknown movies are counted
/// as `unmatched`, not as failures.
pub async fn apply_ratings<S: GraphStore, R: Read>(
    store: &S,
    source: R,
    progress_every: u64,
) -> PhaseReport {
    info!("⭐ Importing ratings...");
    let mut report = PhaseReport::new("ratings");

    for (idx, row) in read_rows::<R, RatingRow>(source).enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                report.fail(&format!("row {}", idx + 1), &RecordError::from(e));
                continue;
            }
        };

        let context = row.display_name();
        match update_rating(store, row).await {
            Ok(true) => {
                report.succeeded += 1;
                tick(&report, progress_every, "Updated");
            }
            Ok(false) => report.unmatched += 1,
            Err(e) => report.fail(&context, &e),
        }
    }

    info!(
        "✅ Updated {} movies with ratings (unmatched: {}, failed: {})",
        report.succeeded,
        report.unmatched,
        report.failed()
    );
    report
}

async fn update_rating<S: GraphStore>(store: &S, row: RatingRow) -> Result<bool, RecordError> {
    let (key, properties) = row.into_update()?;
    Ok(store.set_properties(&key, &properties).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ActedInRow, DirectedRow, MovieRow, PersonRow};
    use crate::store::memory::MemoryStore;
    use crate::store::{NodeKey, NodeLabel, RelType};

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.ensure_unique_constraint(NodeLabel::Person).await.unwrap();
        store.ensure_unique_constraint(NodeLabel::Movie).await.unwrap();
        import_entities::<PersonRow, _, _>(&store, "person_tmdbId,name\n1,A\n2,B\n".as_bytes(), "persons", 1000).await;
        import_entities::<MovieRow, _, _>(&store, "movieId,title\n10,Heat\n".as_bytes(), "movies", 100).await;
        store
    }

    #[test]
    fn test_failure_counts_total() {
        let mut counts = FailureCounts::default();
        counts.record(FailureKind::Parse);
        counts.record(FailureKind::MissingEndpoint);
        counts.record(FailureKind::MissingEndpoint);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.missing_endpoint, 2);
    }

    #[tokio::test]
    async fn test_entity_import_continues_past_bad_rows() {
        let store = MemoryStore::new();
        store.ensure_unique_constraint(NodeLabel::Movie).await.unwrap();
        let csv = "movieId,title,budget\n\
                   10,Heat,60000000\n\
                   ,No Key,\n\
                   11,Bad Budget,lots\n\
                   10,Heat Again,\n\
                   12,Ronin,\n";

        let report = import_entities::<MovieRow, _, _>(&store, csv.as_bytes(), "movies", 100).await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failures.parse, 2);
        assert_eq!(report.failures.store_rejected, 1);
        assert_eq!(report.failed(), 3);
        assert_eq!(store.count_nodes(NodeLabel::Movie).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_relationship_import_counts_missing_endpoints_once() {
        let store = seeded_store().await;
        let csv = "movieId,person_tmdbId,role\n\
                   10,1,Lead\n\
                   10,99,Ghost\n\
                   77,2,Nobody\n\
                   77,99,Nowhere\n\
                   10,2,Support\n";

        let report = import_relationships::<ActedInRow, _, _>(&store, csv.as_bytes(), "ACTED_IN", 1000).await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failures.missing_endpoint, 3);
        assert_eq!(report.failed(), 3);
        assert_eq!(store.count_edges(RelType::ActedIn).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_relationship_parse_failures_are_classified() {
        let store = seeded_store().await;
        let csv = "movieId,person_tmdbId\nten,1\n10,1\n";

        let report = import_relationships::<DirectedRow, _, _>(&store, csv.as_bytes(), "DIRECTED", 100).await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failures.parse, 1);
        assert_eq!(report.failures.missing_endpoint, 0);
    }

    #[tokio::test]
    async fn test_ratings_unmatched_is_not_a_failure() {
        let store = seeded_store().await;
        let csv = "movieId,rating,ratingCount\n10,8.2,4000\n404,5.0,1\n,1.0,1\n";

        let report = apply_ratings(&store, csv.as_bytes(), 1000).await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.unmatched, 1);
        assert_eq!(report.failures.parse, 1);

        let heat = store.node(&NodeKey::movie(10)).unwrap();
        assert_eq!(heat.get("avgRating"), Some(&PropertyValue::Float(8.2)));
        assert_eq!(heat.get("ratingCount"), Some(&PropertyValue::Int(4000)));
        assert_eq!(store.count_nodes(NodeLabel::Movie).await.unwrap(), 1);
    }
}
