//! Logihub Server Library
//!
//! HTTP server for the Logihub parcel and shipment tracker.
//!
//! # Overview
//!
//! The server exposes a small REST API around the one architecturally
//! interesting part of the system: the bulk shipment-ingestion
//! pipeline. An uploaded CSV describing many parcels across many
//! shipments is parsed, optionally enriched with geocoded coordinates,
//! reduced into shipment/route aggregates, and committed to five
//! interdependent tables as a single all-or-nothing transaction.
//!
//! # Architecture
//!
//! Features are organized as vertical slices under [`features`], each
//! with its own commands, queries, and routes. The pipeline itself
//! lives under [`ingest`] and is consumed by the ingestion feature:
//!
//! - [`ingest::parser`] - row parsing and normalization
//! - [`ingest::geocode`] - concurrent address enrichment with an
//!   external lookup service
//! - [`ingest::aggregator`] - single-pass shipment/route reduction
//! - [`ingest::allocator`] - status-history sequence allocation
//! - [`ingest::committer`] - the five-step transactional commit
//!
//! # Framework Stack
//!
//! - **Axum**: web framework and multipart upload handling
//! - **SQLx**: PostgreSQL access and transactions
//! - **Reqwest**: geocoding collaborator client
//! - **Tower**: middleware and service abstractions

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;

// Re-export commonly used types
pub use error::{AppError, AppResult};
