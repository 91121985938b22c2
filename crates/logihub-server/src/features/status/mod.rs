//! Shipping-status feature
//!
//! Append-only status history for shipments and parcels, sharing one
//! `(entity_id, seq)` keyed table. Sequence numbers are allocated with
//! the same rule the ingestion committer uses for its initial
//! "prepared" entries.

pub mod commands;
pub mod queries;
pub mod routes;

/// Which entity a status entry is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Shipment,
    Parcel,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Shipment => "shipment",
            EntityKind::Parcel => "parcel",
        }
    }
}
