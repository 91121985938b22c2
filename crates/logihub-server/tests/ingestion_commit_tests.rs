//! End-to-end ingestion and status tests against a real Postgres
//! instance.
//!
//! These require a running database; run them explicitly with
//! `cargo test -- --ignored`.

use async_trait::async_trait;
use logihub_server::features::status::commands::update_status::{
    self, UpdateStatusCommand,
};
use logihub_server::features::status::queries::get_history::{self, GetHistoryQuery};
use logihub_server::features::status::EntityKind;
use logihub_server::ingest::committer::commit_batch;
use logihub_server::ingest::geocode::Geocoder;
use logihub_server::ingest::models::{Coordinates, IngestBatch, RouteLeg};
use logihub_server::ingest::{self, IngestError, IngestMode};
use sqlx::PgPool;

const FULL_HEADER: &str = "ShipmentID,Departure_time,Estimated_arrival,Total_Weight,Total_Volume,OriginHubID,DestinationHubID,VehicleID,EmpID,Width,Height,Length,Weight,Price,Sender,Sender_Tel,Receiver,Receiver_Tel,ShippingTypeID,Address,Subdistrict,District,Province,Postal_code";

const PARCEL_HEADER: &str = "Width,Height,Length,Weight,Price,Sender,Sender_Tel,Receiver,Receiver_Tel,ShippingTypeID,Address,Subdistrict,District,Province,Postal_code";

/// Geocoder stub that always resolves to a fixed point
struct FixedGeocoder;

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn resolve(&self, _address: &str) -> anyhow::Result<Option<Coordinates>> {
        Ok(Some(Coordinates {
            latitude: 13.7563,
            longitude: 100.5018,
        }))
    }
}

fn full_row(shipment: &str, destination: &str) -> String {
    format!(
        "{shipment},2026-01-10 08:00:00,2026-01-11 18:00:00,120.5,3.2,HUB-A,{destination},V1,E1,10,20,30,1.5,99.0,Ann,0811111111,Bob,0822222222,EXP,1 Main Rd,Suan Luang,Krathum Baen,Samut Sakhon,74110"
    )
}

fn sample_csv() -> String {
    // S1 with destinations B, B, C and S2 with destination D: expect
    // two route legs for S1 and one for S2.
    format!(
        "{FULL_HEADER}\n{}\n{}\n{}\n{}",
        full_row("S1", "HUB-B"),
        full_row("S1", "HUB-B"),
        full_row("S1", "HUB-C"),
        full_row("S2", "HUB-D"),
    )
}

async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires Postgres"]
async fn full_shipment_run_populates_all_tables(pool: PgPool) {
    let report = ingest::run(
        &pool,
        &FixedGeocoder,
        4,
        sample_csv().as_bytes(),
        IngestMode::FullShipment,
        "tester",
    )
    .await
    .unwrap();

    assert_eq!(report.stats.shipments, 2);
    assert_eq!(report.stats.parcels, 4);
    assert_eq!(report.stats.route_legs, 3);
    assert_eq!(report.stats.status_entries, 2);
    assert_eq!(report.skipped_rows, 0);

    assert_eq!(count(&pool, "logis_shipment").await, 2);
    assert_eq!(count(&pool, "logis_parcel").await, 4);
    assert_eq!(count(&pool, "logis_shipment_list").await, 4);
    assert_eq!(count(&pool, "logis_route").await, 3);
    assert_eq!(count(&pool, "logis_shipping_status").await, 2);

    // List entries must reference real parcel ids, in row order.
    let linked: Vec<(i32, i64)> = sqlx::query_as(
        r#"
        SELECT l.seq, l.parcel_id
        FROM logis_shipment_list l
        JOIN logis_parcel p USING (parcel_id)
        WHERE l.shipment_id = 'S1'
        ORDER BY l.seq
        "#,
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(linked.len(), 3);
    assert_eq!(linked.iter().map(|(seq, _)| *seq).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(linked.windows(2).all(|w| w[0].1 < w[1].1));

    // Initial status is "prepared" at the shipment's departure time.
    let (status, seq): (String, i32) = sqlx::query_as(
        "SELECT status, seq FROM logis_shipping_status WHERE entity_id = 'S1'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(status, "prepared");
    assert_eq!(seq, 1);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires Postgres"]
async fn reingesting_keeps_existing_shipments(pool: PgPool) {
    let csv = sample_csv();
    let first = ingest::run(
        &pool,
        &FixedGeocoder,
        4,
        csv.as_bytes(),
        IngestMode::FullShipment,
        "tester",
    )
    .await
    .unwrap();
    assert_eq!(first.stats.shipments, 2);
    assert_eq!(first.stats.route_legs, 3);

    let second = ingest::run(
        &pool,
        &FixedGeocoder,
        4,
        csv.as_bytes(),
        IngestMode::FullShipment,
        "tester",
    )
    .await
    .unwrap();

    // The second run keeps every existing shipment row, list entry and
    // route leg; only parcels and status entries are written again.
    assert_eq!(second.stats.shipments, 0);
    assert_eq!(second.stats.parcels, 4);
    assert_eq!(second.stats.route_legs, 0);

    assert_eq!(count(&pool, "logis_shipment").await, 2);
    assert_eq!(count(&pool, "logis_parcel").await, 8);
    assert_eq!(count(&pool, "logis_shipment_list").await, 4);
    assert_eq!(count(&pool, "logis_route").await, 3);

    let seqs: Vec<i32> = sqlx::query_scalar(
        "SELECT seq FROM logis_shipping_status WHERE entity_id = 'S1' ORDER BY seq",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(seqs, vec![1, 2]);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires Postgres"]
async fn failed_commit_leaves_no_partial_state(pool: PgPool) {
    // Build a batch whose route leg references a shipment the batch
    // does not contain; step 4 hits the foreign key and the whole unit
    // must roll back, including the parcels inserted in step 2.
    let csv = format!("{FULL_HEADER}\n{}", full_row("S1", "HUB-B"));
    let parsed = ingest::parser::RowParser::new(IngestMode::FullShipment)
        .parse(csv.as_bytes())
        .unwrap();

    let mut aggregator = ingest::aggregator::Aggregator::new("tester");
    for row in parsed.rows {
        aggregator.observe(row, None);
    }
    let mut batch: IngestBatch = aggregator.finish();
    batch.route_legs.push(RouteLeg {
        shipment_id: "GHOST".to_string(),
        seq: 1,
        origin_hub_id: "HUB-A".to_string(),
        destination_hub_id: "HUB-B".to_string(),
    });

    let err = commit_batch(&pool, &batch, IngestMode::FullShipment)
        .await
        .unwrap_err();
    assert_eq!(err.step, "insert route legs");

    assert_eq!(count(&pool, "logis_shipment").await, 0);
    assert_eq!(count(&pool, "logis_parcel").await, 0);
    assert_eq!(count(&pool, "logis_shipment_list").await, 0);
    assert_eq!(count(&pool, "logis_route").await, 0);
    assert_eq!(count(&pool, "logis_shipping_status").await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires Postgres"]
async fn parcels_only_run_inserts_parcels_with_coordinates(pool: PgPool) {
    let csv = format!(
        "{PARCEL_HEADER}\n10,20,30,1.5,99.0,Ann,08,Bob,08,EXP,1 Main Rd,Sub,Dist,Prov,74110"
    );

    let report = ingest::run(
        &pool,
        &FixedGeocoder,
        4,
        csv.as_bytes(),
        IngestMode::ParcelsOnly,
        "tester",
    )
    .await
    .unwrap();

    assert_eq!(report.stats.parcels, 1);
    assert_eq!(report.stats.shipments, 0);
    assert_eq!(report.stats.route_legs, 0);
    assert_eq!(report.stats.status_entries, 0);

    assert_eq!(count(&pool, "logis_parcel").await, 1);
    assert_eq!(count(&pool, "logis_shipment").await, 0);
    assert_eq!(count(&pool, "logis_shipment_list").await, 0);
    assert_eq!(count(&pool, "logis_route").await, 0);

    let (lat, lon): (Option<f64>, Option<f64>) =
        sqlx::query_as("SELECT latitude, longitude FROM logis_parcel")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(lat, Some(13.7563));
    assert_eq!(lon, Some(100.5018));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires Postgres"]
async fn structural_failure_writes_nothing(pool: PgPool) {
    // No ShipmentID column in full-shipment mode.
    let csv = format!("{PARCEL_HEADER}\n10,20,30,1.5,99.0,Ann,08,Bob,08,EXP,a,b,c,d,74110");

    let err = ingest::run(
        &pool,
        &FixedGeocoder,
        4,
        csv.as_bytes(),
        IngestMode::FullShipment,
        "tester",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, IngestError::MissingColumn(_)));

    assert_eq!(count(&pool, "logis_parcel").await, 0);
    assert_eq!(count(&pool, "logis_shipment").await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires Postgres"]
async fn status_updates_append_after_ingestion(pool: PgPool) {
    ingest::run(
        &pool,
        &FixedGeocoder,
        4,
        sample_csv().as_bytes(),
        IngestMode::FullShipment,
        "tester",
    )
    .await
    .unwrap();

    let response = update_status::handle(
        pool.clone(),
        UpdateStatusCommand {
            kind: EntityKind::Shipment,
            entity_id: "S1".to_string(),
            status: "in_transit".to_string(),
            status_time: None,
            branch: Some("HUB-B".to_string()),
        },
    )
    .await
    .unwrap();

    // Ingestion already wrote the "prepared" entry at seq 1.
    assert_eq!(response.seq, 2);

    let history = get_history::handle(
        pool.clone(),
        GetHistoryQuery {
            kind: EntityKind::Shipment,
            entity_id: "S1".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, "prepared");
    assert_eq!(history[1].status, "in_transit");
    assert_eq!(history[1].branch.as_deref(), Some("HUB-B"));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires Postgres"]
async fn status_update_for_unknown_shipment_is_not_found(pool: PgPool) {
    let err = update_status::handle(
        pool.clone(),
        UpdateStatusCommand {
            kind: EntityKind::Shipment,
            entity_id: "NOPE".to_string(),
            status: "in_transit".to_string(),
            status_time: None,
            branch: None,
        },
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("not found"));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires Postgres"]
async fn parcel_status_uses_generated_parcel_id(pool: PgPool) {
    ingest::run(
        &pool,
        &FixedGeocoder,
        4,
        sample_csv().as_bytes(),
        IngestMode::FullShipment,
        "tester",
    )
    .await
    .unwrap();

    let parcel_id: i64 = sqlx::query_scalar("SELECT MIN(parcel_id) FROM logis_parcel")
        .fetch_one(&pool)
        .await
        .unwrap();

    let response = update_status::handle(
        pool.clone(),
        UpdateStatusCommand {
            kind: EntityKind::Parcel,
            entity_id: parcel_id.to_string(),
            status: "delivered".to_string(),
            status_time: None,
            branch: None,
        },
    )
    .await
    .unwrap();

    // Parcels get no status entry at ingestion time, so this is seq 1.
    assert_eq!(response.seq, 1);
}
