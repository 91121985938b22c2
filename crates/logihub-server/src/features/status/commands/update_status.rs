use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::super::EntityKind;
use crate::ingest::allocator::next_status_seq;

const STATUS_MAX_LEN: usize = 50;

/// Append one status entry to an entity's history
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusCommand {
    #[serde(skip, default = "default_kind")]
    pub kind: EntityKind,
    #[serde(skip, default)]
    pub entity_id: String,
    pub status: String,
    /// Defaults to the current time when omitted
    pub status_time: Option<NaiveDateTime>,
    /// Branch or hub where the status change happened
    pub branch: Option<String>,
}

fn default_kind() -> EntityKind {
    EntityKind::Shipment
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateStatusResponse {
    pub entity_id: String,
    pub seq: i32,
    pub status: String,
    pub status_time: NaiveDateTime,
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateStatusError {
    #[error("Entity id is required and cannot be empty")]
    EntityIdRequired,
    #[error("Status is required and cannot be empty")]
    StatusRequired,
    #[error("Status must not exceed {STATUS_MAX_LEN} characters")]
    StatusLength,
    #[error("Parcel id '{0}' is not a valid numeric id")]
    InvalidParcelId(String),
    #[error("{0} '{1}' not found")]
    NotFound(&'static str, String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl UpdateStatusCommand {
    pub fn validate(&self) -> Result<(), UpdateStatusError> {
        if self.entity_id.trim().is_empty() {
            return Err(UpdateStatusError::EntityIdRequired);
        }
        if self.status.trim().is_empty() {
            return Err(UpdateStatusError::StatusRequired);
        }
        if self.status.len() > STATUS_MAX_LEN {
            return Err(UpdateStatusError::StatusLength);
        }
        Ok(())
    }
}

/// Append a status entry, allocating its sequence inside the same
/// transaction as the insert so concurrent appends to one entity
/// cannot interleave silently.
#[tracing::instrument(skip(pool, command), fields(kind = command.kind.label(), entity_id = %command.entity_id))]
pub async fn handle(
    pool: PgPool,
    command: UpdateStatusCommand,
) -> Result<UpdateStatusResponse, UpdateStatusError> {
    command.validate()?;

    let mut tx = pool.begin().await?;

    let exists = match command.kind {
        EntityKind::Shipment => {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM logis_shipment WHERE shipment_id = $1)",
            )
            .bind(&command.entity_id)
            .fetch_one(&mut *tx)
            .await?
        },
        EntityKind::Parcel => {
            let parcel_id: i64 = command
                .entity_id
                .parse()
                .map_err(|_| UpdateStatusError::InvalidParcelId(command.entity_id.clone()))?;
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM logis_parcel WHERE parcel_id = $1)",
            )
            .bind(parcel_id)
            .fetch_one(&mut *tx)
            .await?
        },
    };
    if !exists {
        return Err(UpdateStatusError::NotFound(
            command.kind.label(),
            command.entity_id,
        ));
    }

    let seq = next_status_seq(&mut *tx, &command.entity_id).await?;
    let status_time = command
        .status_time
        .unwrap_or_else(|| Utc::now().naive_utc());

    sqlx::query(
        r#"
        INSERT INTO logis_shipping_status (entity_id, seq, status, status_time, branch)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(&command.entity_id)
    .bind(seq)
    .bind(&command.status)
    .bind(status_time)
    .bind(&command.branch)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(seq, status = %command.status, "Status entry appended");

    Ok(UpdateStatusResponse {
        entity_id: command.entity_id,
        seq,
        status: command.status,
        status_time,
    })
}
