use serde::Serialize;

use crate::error::AppError;
use crate::features::AppState;
use crate::ingest::{self, IngestError, IngestMode, TempArtifact};

/// Run one bulk import over an uploaded file
#[derive(Debug, Clone)]
pub struct ImportCommand {
    pub mode: IngestMode,
    pub content: Vec<u8>,
    /// Recorded on every shipment aggregate the run creates
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportResponse {
    pub message: String,
    pub shipments: usize,
    pub parcels: usize,
    pub route_legs: usize,
    pub status_entries: usize,
    pub skipped_rows: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("An uploaded file is required and cannot be empty")]
    ContentRequired,
    #[error("Uploading user is required and cannot be empty")]
    CreatedByRequired,
    #[error("Failed to spool upload: {0}")]
    Spool(#[from] std::io::Error),
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::ContentRequired | ImportError::CreatedByRequired => {
                AppError::Validation(err.to_string())
            },
            ImportError::Spool(e) => AppError::Io(e),
            ImportError::Ingest(e) => AppError::Ingest(e),
        }
    }
}

impl ImportCommand {
    pub fn validate(&self) -> Result<(), ImportError> {
        if self.content.is_empty() {
            return Err(ImportError::ContentRequired);
        }
        if self.created_by.trim().is_empty() {
            return Err(ImportError::CreatedByRequired);
        }
        Ok(())
    }
}

/// Spool the upload, run the pipeline over it, and report counts.
///
/// The spooled artifact is removed when this function returns, on both
/// the success and every failure path.
#[tracing::instrument(skip(state, command), fields(mode = ?command.mode, bytes = command.content.len()))]
pub async fn handle(
    state: AppState,
    command: ImportCommand,
) -> Result<ImportResponse, ImportError> {
    command.validate()?;

    let artifact = TempArtifact::spool(&state.upload_dir, &command.content).await?;
    let input = artifact.read().await?;

    let report = ingest::run(
        &state.pool,
        state.geocoder.as_ref(),
        state.geocode_concurrency,
        &input,
        command.mode,
        &command.created_by,
    )
    .await?;

    let message = match command.mode {
        IngestMode::FullShipment => format!(
            "Imported {} shipments with {} parcels",
            report.stats.shipments, report.stats.parcels
        ),
        IngestMode::ParcelsOnly => format!("Imported {} parcels", report.stats.parcels),
    };

    Ok(ImportResponse {
        message,
        shipments: report.stats.shipments,
        parcels: report.stats.parcels,
        route_legs: report.stats.route_legs,
        status_entries: report.stats.status_entries,
        skipped_rows: report.skipped_rows,
    })
}
