//! Status-history sequence allocation
//!
//! Status entries are keyed by `(entity_id, seq)` where seq is "current
//! stored maximum for this entity, plus one" at write time. The same
//! rule serves the ingestion commit (initial "prepared" entries) and
//! the single-row status-update endpoints.
//!
//! Append allocation is only safe when the read and the subsequent
//! insert share one transaction; concurrent writers to the same entity
//! otherwise race on the maximum. The `(entity_id, seq)` primary key
//! turns such races into a rejected write instead of a silent
//! mis-ordering.

use sqlx::PgExecutor;

/// Initial status recorded for every shipment at ingestion time
pub const STATUS_PREPARED: &str = "prepared";

/// Allocate the next status-history sequence for an entity:
/// `COALESCE(MAX(seq), 0) + 1`.
pub async fn next_status_seq<'e, E>(executor: E, entity_id: &str) -> Result<i32, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let max: Option<i32> =
        sqlx::query_scalar("SELECT MAX(seq) FROM logis_shipping_status WHERE entity_id = $1")
            .bind(entity_id)
            .fetch_one(executor)
            .await?;

    Ok(max.unwrap_or(0) + 1)
}
