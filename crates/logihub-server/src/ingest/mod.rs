//! Bulk shipment ingestion pipeline
//!
//! One ingestion run consumes an uploaded tabular file and, in a
//! single pass: parses rows, optionally enriches parcel addresses with
//! geocoded coordinates, reduces rows into shipment/parcel/route
//! aggregates, and commits five interdependent table writes as one
//! all-or-nothing transaction.
//!
//! Data flows strictly forward (parser -> enricher -> aggregator ->
//! committer); all pipeline state is scoped to the run and discarded
//! after commit or rollback.

use sqlx::PgPool;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub mod aggregator;
pub mod allocator;
pub mod committer;
pub mod geocode;
pub mod models;
pub mod parser;

use aggregator::Aggregator;
use committer::CommitError;
use geocode::Geocoder;
use models::IngestStats;
use parser::RowParser;

/// The two ingestion variants, configurations of one pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// All five commit steps; input carries shipment-level columns.
    FullShipment,
    /// Parcel insert only; input omits shipment-level columns and the
    /// geocoding enricher runs for every row.
    ParcelsOnly,
}

impl IngestMode {
    /// Whether the geocoding enrichment stage runs for this variant
    pub fn geocodes(self) -> bool {
        matches!(self, IngestMode::ParcelsOnly)
    }
}

/// A run-level failure; row-level problems never reach this type
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Input is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("No rows could be parsed from the uploaded file")]
    EmptyBatch,

    #[error("Failed to read uploaded file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Storage commit failed: {0}")]
    Commit(#[from] CommitError),
}

impl IngestError {
    /// Structural errors are the uploader's fault (HTTP 400); commit
    /// errors are storage failures (HTTP 500).
    pub fn is_structural(&self) -> bool {
        !matches!(self, IngestError::Commit(_))
    }
}

/// Result of one completed ingestion run
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub stats: IngestStats,
    /// Rows dropped by row-level parse errors
    pub skipped_rows: usize,
}

/// Execute one ingestion run over the uploaded bytes.
///
/// The enrichment stage (parcels-only variant) issues all lookups
/// concurrently and blocks until every one settles, then the
/// aggregator replays rows in original order against the fully
/// resolved coordinate set. If parsing fails structurally, nothing is
/// written.
pub async fn run(
    pool: &PgPool,
    geocoder: &dyn Geocoder,
    geocode_concurrency: usize,
    input: &[u8],
    mode: IngestMode,
    created_by: &str,
) -> Result<RunReport, IngestError> {
    let parsed = RowParser::new(mode).parse(input)?;
    if parsed.skipped > 0 {
        warn!(skipped = parsed.skipped, "Some rows were dropped during parsing");
    }

    // Synchronization barrier: aggregation must not start until every
    // enrichment has settled, because the reducer is order-sensitive.
    let coordinates = if mode.geocodes() {
        geocode::enrich_rows(geocoder, &parsed.rows, geocode_concurrency).await
    } else {
        vec![None; parsed.rows.len()]
    };

    let mut aggregator = Aggregator::new(created_by);
    for (row, coords) in parsed.rows.into_iter().zip(coordinates) {
        aggregator.observe(row, coords);
    }
    let batch = aggregator.finish();

    let stats = committer::commit_batch(pool, &batch, mode).await?;

    info!(
        ?mode,
        shipments = stats.shipments,
        parcels = stats.parcels,
        skipped = parsed.skipped,
        "Ingestion run completed"
    );

    Ok(RunReport {
        stats,
        skipped_rows: parsed.skipped,
    })
}

/// A spooled upload, deleted when the run ends
///
/// The artifact must never outlive its run: it is removed on drop,
/// which covers success, rollback, and early structural failures
/// alike.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    /// Spool the uploaded bytes to `dir`, creating it if needed.
    pub async fn spool(dir: &Path, content: &[u8]) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("upload-{}.csv", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, content).await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the artifact back for processing.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove upload artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_artifact_round_trip_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = TempArtifact::spool(dir.path(), b"a,b\n1,2").await.unwrap();
        let path = artifact.path().to_path_buf();

        assert_eq!(artifact.read().await.unwrap(), b"a,b\n1,2");
        assert!(path.exists());

        drop(artifact);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_artifact_removed_on_error_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut path = PathBuf::new();
        let result: Result<(), IngestError> = async {
            let artifact = TempArtifact::spool(dir.path(), b"broken").await.unwrap();
            path = artifact.path().to_path_buf();
            // A structural failure aborts the run before any write; the
            // artifact guard still fires.
            Err(IngestError::EmptyBatch)
        }
        .await;

        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_mode_geocoding_flags() {
        assert!(IngestMode::ParcelsOnly.geocodes());
        assert!(!IngestMode::FullShipment.geocodes());
    }

    #[test]
    fn test_structural_classification() {
        assert!(IngestError::EmptyBatch.is_structural());
        assert!(IngestError::MissingColumn("ShipmentID").is_structural());
        assert!(!IngestError::Commit(CommitError {
            step: "insert parcels",
            source: sqlx::Error::PoolClosed,
        })
        .is_structural());
    }
}
