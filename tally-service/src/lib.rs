//! Tally Service Library
//!
//! Wires the tally engines to PostgreSQL and Redis from environment
//! configuration and owns the lifecycle of the background workers.

pub mod config;
pub mod errors;
pub mod telemetry;

pub use config::{Dependencies, Settings};
pub use errors::ServiceError;
