//! Domain layer for the node labeler
//!
//! This module contains the data model, errors, and the port traits the
//! reconciliation engine is written against.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{ControllerError, KeyError, ReconcileError};
