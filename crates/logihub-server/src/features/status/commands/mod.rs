pub mod update_status;

pub use update_status::{UpdateStatusCommand, UpdateStatusError, UpdateStatusResponse};
