use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::PgPool;

use super::super::EntityKind;

/// Fetch an entity's full status history in sequence order
#[derive(Debug, Clone)]
pub struct GetHistoryQuery {
    pub kind: EntityKind,
    pub entity_id: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusHistoryEntry {
    pub seq: i32,
    pub status: String,
    pub status_time: NaiveDateTime,
    pub branch: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GetHistoryError {
    #[error("Entity id is required and cannot be empty")]
    EntityIdRequired,
    #[error("{0} '{1}' not found")]
    NotFound(&'static str, String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl GetHistoryQuery {
    pub fn validate(&self) -> Result<(), GetHistoryError> {
        if self.entity_id.trim().is_empty() {
            return Err(GetHistoryError::EntityIdRequired);
        }
        Ok(())
    }
}

#[tracing::instrument(skip(pool, query), fields(kind = query.kind.label(), entity_id = %query.entity_id))]
pub async fn handle(
    pool: PgPool,
    query: GetHistoryQuery,
) -> Result<Vec<StatusHistoryEntry>, GetHistoryError> {
    query.validate()?;

    let exists = match query.kind {
        EntityKind::Shipment => {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM logis_shipment WHERE shipment_id = $1)",
            )
            .bind(&query.entity_id)
            .fetch_one(&pool)
            .await?
        },
        EntityKind::Parcel => {
            let parcel_id: i64 = query.entity_id.parse().unwrap_or(-1);
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM logis_parcel WHERE parcel_id = $1)",
            )
            .bind(parcel_id)
            .fetch_one(&pool)
            .await?
        },
    };
    if !exists {
        return Err(GetHistoryError::NotFound(
            query.kind.label(),
            query.entity_id,
        ));
    }

    let entries = sqlx::query_as::<_, StatusHistoryEntry>(
        r#"
        SELECT seq, status, status_time, branch
        FROM logis_shipping_status
        WHERE entity_id = $1
        ORDER BY seq
        "#,
    )
    .bind(&query.entity_id)
    .fetch_all(&pool)
    .await?;

    tracing::debug!(count = entries.len(), "Status history fetched");

    Ok(entries)
}
