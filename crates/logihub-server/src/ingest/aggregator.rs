//! Shipment/route aggregator
//!
//! A single-pass, stateful reducer over the input rows in their
//! original order. Order is load-bearing: shipment-list sequence
//! numbers follow row order and route legs are a run-length-encoded
//! transition list of destination hubs, so rows must be observed
//! exactly as parsed (after the enrichment barrier has settled).
//!
//! All accumulation state is held inside the [`Aggregator`] and scoped
//! to one ingestion run; nothing is shared across runs.

use std::collections::HashMap;

use super::models::{
    Coordinates, IngestBatch, NewParcel, ParcelRow, RouteLeg, ShipmentAggregate,
    ShipmentListEntry,
};

/// Per-shipment mutable state tracked during the walk
#[derive(Debug)]
struct ShipmentState {
    /// Destination hub of the most recently emitted leg
    prev_destination: String,
    /// Next shipment-list sequence number (starts at 1, no gaps)
    list_seq: i32,
    /// Next route-leg sequence number (starts at 1, increments per leg)
    route_seq: i32,
}

/// Single-run reducer building the commit batch
#[derive(Default)]
pub struct Aggregator {
    batch: IngestBatch,
    /// Shipment id -> index into `batch.shipments`, used to keep one
    /// aggregate per distinct id (first row wins)
    seen: HashMap<String, usize>,
    state: HashMap<String, ShipmentState>,
    created_by: String,
}

impl Aggregator {
    pub fn new(created_by: impl Into<String>) -> Self {
        Self {
            created_by: created_by.into(),
            ..Self::default()
        }
    }

    /// Observe one row, in original input order.
    ///
    /// Every row contributes one parcel. Rows carrying a shipment id
    /// additionally contribute a shipment-list entry and, when the
    /// destination hub changes, a new route leg:
    ///
    /// - first row of a shipment: leg from the shipment's overall
    ///   origin hub to the row's destination
    /// - destination differs from the previous leg's destination: leg
    ///   from that previous destination to the row's destination
    /// - otherwise the row continues the existing leg
    ///
    /// A destination that reappears later (non-consecutively) starts a
    /// new leg; only consecutive repeats collapse.
    pub fn observe(&mut self, row: ParcelRow, coordinates: Option<Coordinates>) {
        let parcel_index = self.batch.parcels.len();
        self.batch.parcels.push(NewParcel {
            shipment_id: row.shipment_id.clone(),
            width: row.width,
            height: row.height,
            length: row.length,
            weight: row.weight,
            price: row.price,
            sender: row.sender,
            sender_tel: row.sender_tel,
            receiver: row.receiver,
            receiver_tel: row.receiver_tel,
            shipping_type_id: row.shipping_type_id,
            address: row.address,
            subdistrict: row.subdistrict,
            district: row.district,
            province: row.province,
            postal_code: row.postal_code,
            latitude: coordinates.map(|c| c.latitude),
            longitude: coordinates.map(|c| c.longitude),
        });

        let Some(shipment_id) = row.shipment_id else {
            // Parcels-only input: nothing to aggregate.
            return;
        };
        let Some(destination) = row.destination_hub_id else {
            return;
        };

        if !self.seen.contains_key(&shipment_id) {
            // First sighting: the aggregate is built from this row and
            // later rows with the same id never overwrite it.
            let origin = row.origin_hub_id.clone().unwrap_or_default();
            self.seen
                .insert(shipment_id.clone(), self.batch.shipments.len());
            self.batch.shipments.push(ShipmentAggregate {
                shipment_id: shipment_id.clone(),
                departure_time: row.departure_time.unwrap_or_default(),
                estimated_arrival: row.estimated_arrival.unwrap_or_default(),
                total_weight: row.total_weight.unwrap_or_default(),
                total_volume: row.total_volume.unwrap_or_default(),
                origin_hub_id: origin.clone(),
                destination_hub_id: destination.clone(),
                vehicle_id: row.vehicle_id.unwrap_or_default(),
                emp_id: row.emp_id.unwrap_or_default(),
                created_by: self.created_by.clone(),
            });

            self.batch.route_legs.push(RouteLeg {
                shipment_id: shipment_id.clone(),
                seq: 1,
                origin_hub_id: origin,
                destination_hub_id: destination.clone(),
            });
            self.state.insert(
                shipment_id.clone(),
                ShipmentState {
                    prev_destination: destination.clone(),
                    list_seq: 1,
                    route_seq: 1,
                },
            );
        } else {
            let state = self
                .state
                .get_mut(&shipment_id)
                .expect("state exists for every seen shipment");

            if destination != state.prev_destination {
                state.route_seq += 1;
                self.batch.route_legs.push(RouteLeg {
                    shipment_id: shipment_id.clone(),
                    seq: state.route_seq,
                    origin_hub_id: state.prev_destination.clone(),
                    destination_hub_id: destination.clone(),
                });
                state.prev_destination = destination.clone();
            }
        }

        let state = self
            .state
            .get_mut(&shipment_id)
            .expect("state exists for every seen shipment");
        self.batch.list_entries.push(ShipmentListEntry {
            shipment_id,
            seq: state.list_seq,
            parcel_index,
            destination_hub_id: destination,
        });
        state.list_seq += 1;
    }

    /// Finalize the run and hand the immutable batch to the committer
    pub fn finish(self) -> IngestBatch {
        self.batch
    }
}
