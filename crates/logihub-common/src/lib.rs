//! Shared building blocks for Logihub components.
//!
//! Currently this covers the common error type and the tracing/logging
//! bootstrap used by the server binary.

pub mod error;
pub mod logging;

pub use error::{LogihubError, Result};
