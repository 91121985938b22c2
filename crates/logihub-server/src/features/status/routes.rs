//! Shipping-status API routes
//!
//! - `PUT /api/v1/shipments/:id/status` - Append a shipment status entry
//! - `GET /api/v1/shipments/:id/status` - Shipment status history
//! - `PUT /api/v1/parcels/:id/status` - Append a parcel status entry
//! - `GET /api/v1/parcels/:id/status` - Parcel status history

use crate::api::response::{ApiResponse, ErrorResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::put,
    Json, Router,
};

use super::{
    commands::{UpdateStatusCommand, UpdateStatusError},
    queries::{GetHistoryError, GetHistoryQuery},
    EntityKind,
};
use crate::features::AppState;

pub fn status_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/shipments/:id/status",
            put(update_shipment_status).get(get_shipment_history),
        )
        .route(
            "/parcels/:id/status",
            put(update_parcel_status).get(get_parcel_history),
        )
}

#[tracing::instrument(skip(state, command), fields(shipment_id = %id))]
async fn update_shipment_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut command): Json<UpdateStatusCommand>,
) -> Result<Response, StatusApiError> {
    command.kind = EntityKind::Shipment;
    command.entity_id = id;

    let response = super::commands::update_status::handle(state.pool, command).await?;

    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

#[tracing::instrument(skip(state, command), fields(parcel_id = %id))]
async fn update_parcel_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut command): Json<UpdateStatusCommand>,
) -> Result<Response, StatusApiError> {
    command.kind = EntityKind::Parcel;
    command.entity_id = id;

    let response = super::commands::update_status::handle(state.pool, command).await?;

    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

#[tracing::instrument(skip(state), fields(shipment_id = %id))]
async fn get_shipment_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, StatusApiError> {
    let query = GetHistoryQuery {
        kind: EntityKind::Shipment,
        entity_id: id,
    };

    let entries = super::queries::get_history::handle(state.pool, query).await?;

    Ok((StatusCode::OK, Json(ApiResponse::success(entries))).into_response())
}

#[tracing::instrument(skip(state), fields(parcel_id = %id))]
async fn get_parcel_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, StatusApiError> {
    let query = GetHistoryQuery {
        kind: EntityKind::Parcel,
        entity_id: id,
    };

    let entries = super::queries::get_history::handle(state.pool, query).await?;

    Ok((StatusCode::OK, Json(ApiResponse::success(entries))).into_response())
}

#[derive(Debug)]
enum StatusApiError {
    UpdateError(UpdateStatusError),
    HistoryError(GetHistoryError),
}

impl From<UpdateStatusError> for StatusApiError {
    fn from(err: UpdateStatusError) -> Self {
        Self::UpdateError(err)
    }
}

impl From<GetHistoryError> for StatusApiError {
    fn from(err: GetHistoryError) -> Self {
        Self::HistoryError(err)
    }
}

impl IntoResponse for StatusApiError {
    fn into_response(self) -> Response {
        match self {
            StatusApiError::UpdateError(UpdateStatusError::EntityIdRequired)
            | StatusApiError::UpdateError(UpdateStatusError::StatusRequired)
            | StatusApiError::UpdateError(UpdateStatusError::StatusLength)
            | StatusApiError::UpdateError(UpdateStatusError::InvalidParcelId(_))
            | StatusApiError::HistoryError(GetHistoryError::EntityIdRequired) => {
                let error = ErrorResponse::new("VALIDATION_ERROR", self.to_string());
                (StatusCode::BAD_REQUEST, Json(error)).into_response()
            },
            StatusApiError::UpdateError(UpdateStatusError::NotFound(..))
            | StatusApiError::HistoryError(GetHistoryError::NotFound(..)) => {
                let error = ErrorResponse::new("NOT_FOUND", self.to_string());
                (StatusCode::NOT_FOUND, Json(error)).into_response()
            },
            StatusApiError::UpdateError(UpdateStatusError::Database(_))
            | StatusApiError::HistoryError(GetHistoryError::Database(_)) => {
                tracing::error!("Database error during status operation: {}", self);
                let error = ErrorResponse::new("INTERNAL_ERROR", "A database error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            },
        }
    }
}

impl std::fmt::Display for StatusApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpdateError(e) => write!(f, "{}", e),
            Self::HistoryError(e) => write!(f, "{}", e),
        }
    }
}
