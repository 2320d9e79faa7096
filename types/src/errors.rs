//! Error taxonomy shared by the holder and the proxy.
//!
//! `AlreadyConstructed` is a programmer error surfaced at the construction
//! call site. Everything else leaves state untouched and is recoverable.

use thiserror::Error;

use crate::FieldName;

/// A second direct construction of a single-instance holder was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("instance already constructed; use the shared accessor instead")]
pub struct AlreadyConstructed;

/// A handler vetoed a proxied write. The target was not modified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("write to `{field}` rejected: {reason}")]
pub struct ValidationRejected {
    field: FieldName,
    reason: String,
}

impl ValidationRejected {
    #[must_use]
    pub fn new(field: FieldName, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn field(&self) -> &FieldName {
        &self.field
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Hard-error form of the "not found" read signal.
///
/// Plain reads return `None` for missing properties; this exists for callers
/// that would rather propagate with `?`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("property `{field}` does not exist")]
pub struct PropertyNotFound {
    pub field: FieldName,
}

/// The target itself refused a write that all validators accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("`{field}` is frozen and cannot be assigned")]
    Frozen { field: FieldName },
    #[error("target has no field `{field}`")]
    UnknownField { field: FieldName },
    #[error("`{field}` expects {expected}, got {actual}")]
    TypeMismatch {
        field: FieldName,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Outcome of a failed proxied write. In every case the target is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error(transparent)]
    Rejected(#[from] ValidationRejected),
    #[error(transparent)]
    Target(#[from] TargetError),
}

impl WriteError {
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, WriteError::Rejected(_))
    }
}
