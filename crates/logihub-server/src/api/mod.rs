//! API module
//!
//! Shared response types for the Logihub HTTP API.

pub mod response;

pub use response::{ApiResponse, ErrorResponse};
