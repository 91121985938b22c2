//! Bulk ingestion feature
//!
//! Accepts multipart file uploads and runs them through the shipment
//! ingestion pipeline in one of two variants: full-shipment (all five
//! commit steps) or parcels-only (parcel insert plus geocoding).

pub mod commands;
pub mod routes;
