//! Transactional committer
//!
//! Writes the five derived collections in a fixed dependency order
//! inside one transaction:
//!
//! 1. upsert shipment aggregates
//! 2. insert parcels, capturing each store-generated parcel id
//! 3. insert shipment-list entries (needs the ids from step 2)
//! 4. insert route legs
//! 5. insert initial "prepared" status entries
//!
//! Steps run strictly in order on the transaction's single connection.
//! Any failure aborts the whole unit; the dropped transaction rolls
//! every prior step back, so no partial state is ever visible.
//!
//! Steps 1, 3 and 4 are insert-or-keep: re-ingesting a known shipment
//! keeps its existing aggregate, list entries and route legs, while
//! parcels (step 2) and status entries (step 5) always append.
//!
//! Parcels-only ingestion runs the same code path with everything but
//! step 2 disabled.

use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info};

use super::allocator::{next_status_seq, STATUS_PREPARED};
use super::models::{IngestBatch, IngestStats};
use super::IngestMode;

/// A commit failure, carrying the offending step for error surfacing
#[derive(Debug, Error)]
#[error("{step}: {source}")]
pub struct CommitError {
    pub step: &'static str,
    #[source]
    pub source: sqlx::Error,
}

impl CommitError {
    fn at(step: &'static str) -> impl FnOnce(sqlx::Error) -> CommitError {
        move |source| CommitError { step, source }
    }
}

/// Commit one aggregated batch as a single all-or-nothing unit of work.
///
/// Returns the per-collection counts of rows actually written. Parcel ids are taken
/// from each insert's `RETURNING` clause, in insertion order, and
/// propagated into the shipment-list entries by row index; no
/// contiguous-range arithmetic is involved.
pub async fn commit_batch(
    pool: &PgPool,
    batch: &IngestBatch,
    mode: IngestMode,
) -> Result<IngestStats, CommitError> {
    let mut tx = pool.begin().await.map_err(CommitError::at("begin transaction"))?;
    let mut stats = IngestStats::default();

    // Step 1: shipment aggregates. Re-ingesting a known shipment id is
    // a no-op; the existing row is kept.
    if mode == IngestMode::FullShipment {
        let mut inserted: u64 = 0;
        for shipment in &batch.shipments {
            let result = sqlx::query(
                r#"
                INSERT INTO logis_shipment
                    (shipment_id, departure_time, estimated_arrival, total_weight,
                     total_volume, origin_hub_id, destination_hub_id, vehicle_id,
                     emp_id, created_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (shipment_id) DO NOTHING
                "#,
            )
            .bind(&shipment.shipment_id)
            .bind(shipment.departure_time)
            .bind(shipment.estimated_arrival)
            .bind(shipment.total_weight)
            .bind(shipment.total_volume)
            .bind(&shipment.origin_hub_id)
            .bind(&shipment.destination_hub_id)
            .bind(&shipment.vehicle_id)
            .bind(&shipment.emp_id)
            .bind(&shipment.created_by)
            .execute(&mut *tx)
            .await
            .map_err(CommitError::at("upsert shipments"))?;
            inserted += result.rows_affected();
        }
        stats.shipments = inserted as usize;
    }

    // Step 2: parcels, collecting the generated id of every row.
    let mut parcel_ids = Vec::with_capacity(batch.parcels.len());
    for parcel in &batch.parcels {
        let parcel_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO logis_parcel
                (shipment_id, width, height, length, weight, price,
                 sender, sender_tel, receiver, receiver_tel, shipping_type_id,
                 address, subdistrict, district, province, postal_code,
                 latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18)
            RETURNING parcel_id
            "#,
        )
        .bind(&parcel.shipment_id)
        .bind(parcel.width)
        .bind(parcel.height)
        .bind(parcel.length)
        .bind(parcel.weight)
        .bind(parcel.price)
        .bind(&parcel.sender)
        .bind(&parcel.sender_tel)
        .bind(&parcel.receiver)
        .bind(&parcel.receiver_tel)
        .bind(&parcel.shipping_type_id)
        .bind(&parcel.address)
        .bind(&parcel.subdistrict)
        .bind(&parcel.district)
        .bind(&parcel.province)
        .bind(&parcel.postal_code)
        .bind(parcel.latitude)
        .bind(parcel.longitude)
        .fetch_one(&mut *tx)
        .await
        .map_err(CommitError::at("insert parcels"))?;

        parcel_ids.push(parcel_id);
    }
    stats.parcels = parcel_ids.len();

    if mode == IngestMode::FullShipment {
        // Step 3: shipment-list entries, now that parcel ids are known.
        // A re-ingested shipment already holds entries at these seqs;
        // the existing rows win, mirroring step 1.
        for entry in &batch.list_entries {
            sqlx::query(
                r#"
                INSERT INTO logis_shipment_list
                    (shipment_id, seq, parcel_id, destination_hub_id)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (shipment_id, seq) DO NOTHING
                "#,
            )
            .bind(&entry.shipment_id)
            .bind(entry.seq)
            .bind(parcel_ids[entry.parcel_index])
            .bind(&entry.destination_hub_id)
            .execute(&mut *tx)
            .await
            .map_err(CommitError::at("insert shipment list entries"))?;
        }

        // Step 4: route legs, insert-or-keep for the same reason.
        let mut inserted: u64 = 0;
        for leg in &batch.route_legs {
            let result = sqlx::query(
                r#"
                INSERT INTO logis_route
                    (shipment_id, seq, origin_hub_id, destination_hub_id)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (shipment_id, seq) DO NOTHING
                "#,
            )
            .bind(&leg.shipment_id)
            .bind(leg.seq)
            .bind(&leg.origin_hub_id)
            .bind(&leg.destination_hub_id)
            .execute(&mut *tx)
            .await
            .map_err(CommitError::at("insert route legs"))?;
            inserted += result.rows_affected();
        }
        stats.route_legs = inserted as usize;

        // Step 5: initial status entries, one per shipment, sequenced
        // with the shared append allocator.
        for shipment in &batch.shipments {
            let seq = next_status_seq(&mut *tx, &shipment.shipment_id)
                .await
                .map_err(CommitError::at("insert status history"))?;
            sqlx::query(
                r#"
                INSERT INTO logis_shipping_status
                    (entity_id, seq, status, status_time, branch)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(&shipment.shipment_id)
            .bind(seq)
            .bind(STATUS_PREPARED)
            .bind(shipment.departure_time)
            .bind(&shipment.origin_hub_id)
            .execute(&mut *tx)
            .await
            .map_err(CommitError::at("insert status history"))?;
        }
        stats.status_entries = batch.shipments.len();
    }

    tx.commit().await.map_err(CommitError::at("commit transaction"))?;

    debug!(?mode, "Commit unit finished");
    info!(
        shipments = stats.shipments,
        parcels = stats.parcels,
        route_legs = stats.route_legs,
        status_entries = stats.status_entries,
        "Batch committed"
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_error_carries_step_context() {
        let err = CommitError {
            step: "insert parcels",
            source: sqlx::Error::PoolClosed,
        };
        assert!(err.to_string().starts_with("insert parcels:"));
    }
}
