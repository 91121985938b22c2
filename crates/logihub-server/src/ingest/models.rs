//! Pipeline data types
//!
//! Everything here is scoped to a single ingestion run: the typed rows
//! produced by the parser, the aggregates produced by the reducer, and
//! the batch handed to the transactional committer. None of it outlives
//! the run; after commit the durable store owns the data.

use chrono::NaiveDateTime;
use serde::Serialize;

/// Resolved coordinates from the geocoding collaborator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// One typed input row, ephemeral
///
/// Shipment-level fields are `None` in parcels-only ingestion, where
/// the input omits those columns entirely.
#[derive(Debug, Clone)]
pub struct ParcelRow {
    pub shipment_id: Option<String>,
    pub departure_time: Option<NaiveDateTime>,
    pub estimated_arrival: Option<NaiveDateTime>,
    pub total_weight: Option<f64>,
    pub total_volume: Option<f64>,
    pub origin_hub_id: Option<String>,
    pub destination_hub_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub emp_id: Option<String>,

    pub width: f64,
    pub height: f64,
    pub length: f64,
    pub weight: f64,
    pub price: f64,
    pub sender: String,
    pub sender_tel: String,
    pub receiver: String,
    pub receiver_tel: String,
    pub shipping_type_id: String,
    pub address: String,
    pub subdistrict: String,
    pub district: String,
    pub province: String,
    pub postal_code: String,
}

/// One shipment aggregate, built from the first row bearing its id
#[derive(Debug, Clone)]
pub struct ShipmentAggregate {
    pub shipment_id: String,
    pub departure_time: NaiveDateTime,
    pub estimated_arrival: NaiveDateTime,
    pub total_weight: f64,
    pub total_volume: f64,
    pub origin_hub_id: String,
    pub destination_hub_id: String,
    pub vehicle_id: String,
    pub emp_id: String,
    pub created_by: String,
}

/// One parcel pending insertion; the store assigns its id at commit
#[derive(Debug, Clone)]
pub struct NewParcel {
    pub shipment_id: Option<String>,
    pub width: f64,
    pub height: f64,
    pub length: f64,
    pub weight: f64,
    pub price: f64,
    pub sender: String,
    pub sender_tel: String,
    pub receiver: String,
    pub receiver_tel: String,
    pub shipping_type_id: String,
    pub address: String,
    pub subdistrict: String,
    pub district: String,
    pub province: String,
    pub postal_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Links a shipment to one parcel with a per-shipment sequence number
///
/// `parcel_index` points at the source row's position in the batch's
/// parcel list; the committer resolves it to the store-generated parcel
/// id after the parcel insert step.
#[derive(Debug, Clone)]
pub struct ShipmentListEntry {
    pub shipment_id: String,
    pub seq: i32,
    pub parcel_index: usize,
    pub destination_hub_id: String,
}

/// One contiguous hop between two hubs within a shipment's path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLeg {
    pub shipment_id: String,
    pub seq: i32,
    pub origin_hub_id: String,
    pub destination_hub_id: String,
}

/// Output of the aggregator, input to the committer
#[derive(Debug, Default)]
pub struct IngestBatch {
    /// Shipment aggregates in first-seen order
    pub shipments: Vec<ShipmentAggregate>,
    /// Parcels in original row order
    pub parcels: Vec<NewParcel>,
    pub list_entries: Vec<ShipmentListEntry>,
    pub route_legs: Vec<RouteLeg>,
}

/// Counts returned to the caller after a successful commit
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct IngestStats {
    pub shipments: usize,
    pub parcels: usize,
    pub route_legs: usize,
    pub status_entries: usize,
}
