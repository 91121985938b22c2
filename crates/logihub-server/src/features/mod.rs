//! Feature modules organized by domain
//!
//! Each feature owns its commands (writes), queries (reads) and HTTP
//! routes, wired together here into the versioned API router.

use axum::Router;
use sqlx::PgPool;
use std::path::PathBuf;
use std::sync::Arc;

use crate::ingest::geocode::Geocoder;

pub mod ingestion;
pub mod status;

/// Shared state handed to every feature router
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub geocoder: Arc<dyn Geocoder>,
    /// Bound on in-flight geocoding lookups per ingestion run
    pub geocode_concurrency: usize,
    /// Spool directory for uploaded files
    pub upload_dir: PathBuf,
}

/// Assemble the `/api/v1` router from the feature slices
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(ingestion::routes::ingestion_routes())
        .merge(status::routes::status_routes())
}
