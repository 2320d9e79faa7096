//! Core domain types for Gatekeep.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod audit;
mod errors;
mod proofs;
mod value;

pub use audit::AuditLogEntry;
pub use errors::{AlreadyConstructed, PropertyNotFound, TargetError, ValidationRejected, WriteError};
pub use proofs::{FieldName, FieldNameError, StaticFieldName};
pub use value::Value;
