//! Ingestion API routes
//!
//! - `POST /api/v1/shipments/import` - Full-shipment bulk import
//! - `POST /api/v1/parcels/import` - Parcels-only bulk import
//!
//! Both endpoints take a multipart form with a `file` field and read
//! the acting user from the `X-User-Id` header.

use crate::api::response::ApiResponse;
use crate::error::{AppError, AppResult};
use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::commands::{ImportCommand, ImportResponse};
use crate::features::AppState;
use crate::ingest::IngestMode;

const USER_HEADER: &str = "x-user-id";
const DEFAULT_USER: &str = "system";

pub fn ingestion_routes() -> Router<AppState> {
    Router::new()
        .route("/shipments/import", post(import_shipments))
        .route("/parcels/import", post(import_parcels))
}

#[tracing::instrument(skip(state, headers, multipart))]
async fn import_shipments(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Response> {
    import(state, headers, multipart, IngestMode::FullShipment).await
}

#[tracing::instrument(skip(state, headers, multipart))]
async fn import_parcels(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Response> {
    import(state, headers, multipart, IngestMode::ParcelsOnly).await
}

async fn import(
    state: AppState,
    headers: HeaderMap,
    mut multipart: Multipart,
    mode: IngestMode,
) -> AppResult<Response> {
    let mut content: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::Validation(format!("Failed to read multipart upload: {}", e))
    })? {
        if field.name() == Some("file") {
            let data = field.bytes().await.map_err(|e| {
                AppError::Validation(format!("Failed to read multipart upload: {}", e))
            })?;
            content = Some(data.to_vec());
        }
    }

    let content = content
        .ok_or_else(|| AppError::Validation("No 'file' field in multipart data".to_string()))?;
    let created_by = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_USER)
        .to_string();

    let command = ImportCommand {
        mode,
        content,
        created_by,
    };

    let response: ImportResponse = super::commands::import::handle(state, command).await?;

    tracing::info!(
        shipments = response.shipments,
        parcels = response.parcels,
        skipped = response.skipped_rows,
        "Bulk import completed via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}
