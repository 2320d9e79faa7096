//! Audit records for successful writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{FieldName, Value};

/// Record of one successful state change.
///
/// Built by the proxy after the target accepted the write; read-only once
/// created. `old_value` is `None` when the write introduced the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    field: FieldName,
    old_value: Option<Value>,
    new_value: Value,
    timestamp: DateTime<Utc>,
}

impl AuditLogEntry {
    #[must_use]
    pub fn new(field: FieldName, old_value: Option<Value>, new_value: Value) -> Self {
        Self::at(field, old_value, new_value, Utc::now())
    }

    /// Used by tests and replay tooling that need a fixed clock.
    #[must_use]
    pub fn at(
        field: FieldName,
        old_value: Option<Value>,
        new_value: Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            field,
            old_value,
            new_value,
            timestamp,
        }
    }

    #[must_use]
    pub fn field(&self) -> &FieldName {
        &self.field
    }

    #[must_use]
    pub fn old_value(&self) -> Option<&Value> {
        self.old_value.as_ref()
    }

    #[must_use]
    pub fn new_value(&self) -> &Value {
        &self.new_value
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
