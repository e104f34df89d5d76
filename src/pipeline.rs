//! Import Pipeline
//!
//! Runs the phases strictly in order against one store:
//! reset -> schema -> persons -> movies -> ACTED_IN -> DIRECTED -> ratings
//! -> (derived labels) -> verification.
//!
//! Relationship import uses plain CREATE, so a second run over a populated
//! store would duplicate edges. The pipeline therefore refuses to start unless
//! the caller confirmed the reset, and the relationship phases can only be
//! reached with the [`ResetReceipt`] produced by [`reset_store`].
//!
//! All sources are opened before the reset, so an unreadable input leaves the
//! existing graph as it was.

use crate::importer::{apply_ratings, import_entities, import_relationships, PhaseReport};
use crate::records::{ActedInRow, DirectedRow, MovieRow, PersonRow};
use crate::store::{GraphStore, NodeLabel, RelType, Role};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

// ============================================================================
// Configuration
// ============================================================================

/// Location of each CSV source
#[derive(Debug, Clone)]
pub struct DataSources {
    pub persons: PathBuf,
    pub movies: PathBuf,
    pub acted_in: PathBuf,
    pub directed: PathBuf,
    pub ratings: PathBuf,
}

impl DataSources {
    /// Standard file names inside `dir`
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            persons: dir.join("persons.csv"),
            movies: dir.join("movies.csv"),
            acted_in: dir.join("acted_in.csv"),
            directed: dir.join("directed.csv"),
            ratings: dir.join("ratings.csv"),
        }
    }

    /// Open every source, failing on the first one that cannot be read.
    pub fn open_all(&self) -> Result<OpenSources> {
        Ok(OpenSources {
            persons: open_source(&self.persons)?,
            movies: open_source(&self.movies)?,
            acted_in: open_source(&self.acted_in)?,
            directed: open_source(&self.directed)?,
            ratings: open_source(&self.ratings)?,
        })
    }
}

/// Readers for each source, opened ahead of any store mutation
#[derive(Debug)]
pub struct OpenSources {
    pub persons: BufReader<File>,
    pub movies: BufReader<File>,
    pub acted_in: BufReader<File>,
    pub directed: BufReader<File>,
    pub ratings: BufReader<File>,
}

/// Progress log interval per phase, in records
#[derive(Debug, Clone, Copy)]
pub struct ProgressIntervals {
    pub persons: u64,
    pub movies: u64,
    pub acted_in: u64,
    pub directed: u64,
    pub ratings: u64,
}

impl Default for ProgressIntervals {
    fn default() -> Self {
        Self {
            persons: 1000,
            movies: 100,
            acted_in: 1000,
            directed: 100,
            ratings: 1000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Caller acknowledges that the target store will be wiped
    pub confirm_reset: bool,
    pub derive_labels: bool,
    pub progress: ProgressIntervals,
}

// ============================================================================
// Reset & Schema
// ============================================================================

/// Proof that the store was cleared in this run.
#[derive(Debug)]
pub struct ResetReceipt {
    _private: (),
}

pub async fn reset_store<S: GraphStore>(store: &S) -> Result<ResetReceipt> {
    info!("🧹 Clearing database...");
    store.clear().await.context("Failed to clear database")?;
    info!("✅ Database cleared");
    Ok(ResetReceipt { _private: () })
}

pub async fn create_constraints<S: GraphStore>(store: &S) -> Result<()> {
    info!("📐 Creating constraints...");
    for label in [NodeLabel::Movie, NodeLabel::Person] {
        store
            .ensure_unique_constraint(label)
            .await
            .with_context(|| format!("Failed to create {} unique constraint", label))?;
        info!("   {} unique constraint ready ({})", label, label.constraint_name());
    }
    Ok(())
}

fn open_source(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

// ============================================================================
// Relationship Phases
// ============================================================================

pub async fn import_acted_in<S: GraphStore, R: Read>(
    store: &S,
    _reset: &ResetReceipt,
    source: R,
    progress_every: u64,
) -> PhaseReport {
    import_relationships::<ActedInRow, _, _>(store, source, "ACTED_IN", progress_every).await
}

pub async fn import_directed<S: GraphStore, R: Read>(
    store: &S,
    _reset: &ResetReceipt,
    source: R,
    progress_every: u64,
) -> PhaseReport {
    import_relationships::<DirectedRow, _, _>(store, source, "DIRECTED", progress_every).await
}

// ============================================================================
// Derived Labels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DerivedReport {
    pub genre_links: i64,
    pub actors_tagged: i64,
    pub directors_tagged: i64,
}

/// Genre nodes from movie genre lists, Actor/Director labels from edges.
pub async fn derive_labels<S: GraphStore>(store: &S) -> Result<DerivedReport> {
    info!("🏷️  Deriving genres and person roles...");
    store
        .ensure_unique_constraint(NodeLabel::Genre)
        .await
        .context("Failed to create Genre unique constraint")?;

    let genre_links = store.link_genres().await.context("Failed to link genres")?;
    let actors_tagged = store
        .tag_role(Role::Actor)
        .await
        .context("Failed to tag actors")?;
    let directors_tagged = store
        .tag_role(Role::Director)
        .await
        .context("Failed to tag directors")?;

    info!(
        "✅ Linked {} movie genres, tagged {} actors and {} directors",
        genre_links, actors_tagged, directors_tagged
    );
    Ok(DerivedReport { genre_links, actors_tagged, directors_tagged })
}

// ============================================================================
// Verification
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DerivedCounts {
    pub genres: i64,
    pub in_genre: i64,
    pub actors: i64,
    pub directors: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub movies: i64,
    pub persons: i64,
    pub acted_in: i64,
    pub directed: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived: Option<DerivedCounts>,
}

/// Read-only count queries over the imported graph.
pub async fn verify<S: GraphStore>(store: &S, include_derived: bool) -> Result<Verification> {
    info!("🔍 Verifying import...");
    let movies = store.count_nodes(NodeLabel::Movie).await.context("Failed to count movies")?;
    let persons = store.count_nodes(NodeLabel::Person).await.context("Failed to count persons")?;
    let acted_in = store
        .count_edges(RelType::ActedIn)
        .await
        .context("Failed to count ACTED_IN relationships")?;
    let directed = store
        .count_edges(RelType::Directed)
        .await
        .context("Failed to count DIRECTED relationships")?;

    info!("   Movies: {}", movies);
    info!("   Persons: {}", persons);
    info!("   ACTED_IN relationships: {}", acted_in);
    info!("   DIRECTED relationships: {}", directed);

    let derived = if include_derived {
        let counts = DerivedCounts {
            genres: store.count_nodes(NodeLabel::Genre).await.context("Failed to count genres")?,
            in_genre: store
                .count_edges(RelType::InGenre)
                .await
                .context("Failed to count IN_GENRE relationships")?,
            actors: store.count_role(Role::Actor).await.context("Failed to count actors")?,
            directors: store
                .count_role(Role::Director)
                .await
                .context("Failed to count directors")?,
        };
        info!("   Genres: {} (IN_GENRE: {})", counts.genres, counts.in_genre);
        info!("   Actors: {}, Directors: {}", counts.actors, counts.directors);
        Some(counts)
    } else {
        None
    };

    Ok(Verification { movies, persons, acted_in, directed, derived })
}

// ============================================================================
// Orchestration
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub run_id: Uuid,
    pub phases: Vec<PhaseReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived: Option<DerivedReport>,
    pub verification: Verification,
    pub elapsed_ms: u128,
}

impl PipelineSummary {
    pub fn phase(&self, name: &str) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == name)
    }
}

pub struct ImportPipeline<'a, S: GraphStore> {
    store: &'a S,
    sources: DataSources,
    options: ImportOptions,
}

impl<'a, S: GraphStore> ImportPipeline<'a, S> {
    pub fn new(store: &'a S, sources: DataSources, options: ImportOptions) -> Self {
        Self { store, sources, options }
    }

    /// Run every phase in order. Only setup-level failures are returned;
    /// per-record failures end up in the phase reports.
    pub async fn run(&self) -> Result<PipelineSummary> {
        if !self.options.confirm_reset {
            bail!("Import wipes the target database first; rerun with reset confirmation (--confirm-reset)");
        }

        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let progress = self.options.progress;
        info!("🚀 Starting import run {}", run_id);

        let sources = self.sources.open_all()?;
        let receipt = reset_store(self.store).await?;
        create_constraints(self.store).await?;

        let phases = vec![
            import_entities::<PersonRow, _, _>(self.store, sources.persons, "persons", progress.persons).await,
            import_entities::<MovieRow, _, _>(self.store, sources.movies, "movies", progress.movies).await,
            import_acted_in(self.store, &receipt, sources.acted_in, progress.acted_in).await,
            import_directed(self.store, &receipt, sources.directed, progress.directed).await,
            apply_ratings(self.store, sources.ratings, progress.ratings).await,
        ];

        let derived = if self.options.derive_labels {
            Some(derive_labels(self.store).await?)
        } else {
            None
        };

        let verification = verify(self.store, self.options.derive_labels).await?;

        let elapsed_ms = started.elapsed().as_millis();
        info!("🎉 Import run {} completed in {}ms", run_id, elapsed_ms);

        Ok(PipelineSummary { run_id, phases, derived, verification, elapsed_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[test]
    fn test_sources_use_standard_file_names() {
        let sources = DataSources::from_dir("/data/movies");
        assert_eq!(sources.persons, PathBuf::from("/data/movies/persons.csv"));
        assert_eq!(sources.acted_in, PathBuf::from("/data/movies/acted_in.csv"));
        assert_eq!(sources.ratings, PathBuf::from("/data/movies/ratings.csv"));
    }

    #[test]
    fn test_open_all_names_the_missing_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        for name in ["persons.csv", "movies.csv", "acted_in.csv", "directed.csv"] {
            std::fs::write(dir.path().join(name), "movieId\n").unwrap();
        }

        let err = DataSources::from_dir(dir.path()).open_all().unwrap_err();
        assert!(err.to_string().contains("ratings.csv"));

        std::fs::write(dir.path().join("ratings.csv"), "movieId\n").unwrap();
        assert!(DataSources::from_dir(dir.path()).open_all().is_ok());
    }

    #[test]
    fn test_default_progress_intervals() {
        let progress = ProgressIntervals::default();
        assert_eq!(progress.persons, 1000);
        assert_eq!(progress.movies, 100);
        assert_eq!(progress.directed, 100);
    }

    #[tokio::test]
    async fn test_refusal_happens_before_any_file_is_read() {
        let store = MemoryStore::new();
        let sources = DataSources::from_dir("/nonexistent");

        let err = ImportPipeline::new(&store, sources, ImportOptions::default())
            .run()
            .await
            .unwrap_err();

        assert!(err.to_string().contains("reset confirmation"));
    }

    #[tokio::test]
    async fn test_verify_skips_derived_counts_unless_requested() {
        let store = MemoryStore::new();
        let verification = verify(&store, false).await.unwrap();
        assert_eq!(verification.movies, 0);
        assert!(verification.derived.is_none());

        let verification = verify(&store, true).await.unwrap();
        assert_eq!(verification.derived.map(|d| d.genres), Some(0));
    }
}
