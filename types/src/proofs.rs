//! Proof types for validated field names.
//!
//! These types enforce invariants at construction time. Once you hold a value,
//! you know it satisfies all required constraints.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of a property on a proxied target.
///
/// # Invariants
///
/// - Never empty
/// - No leading or trailing whitespace
/// - No control characters
///
/// # Serde
///
/// Serializes as a plain string. Deserialization validates and fails if the
/// name violates any invariant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldName(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldNameError {
    #[error("field name must not be empty")]
    Empty,
    #[error("field name {0:?} has surrounding whitespace")]
    Padded(String),
    #[error("field name {0:?} contains control characters")]
    Control(String),
}

impl FieldName {
    pub fn new(value: impl Into<String>) -> Result<Self, FieldNameError> {
        let value = value.into();
        if value.is_empty() {
            return Err(FieldNameError::Empty);
        }
        if value.trim() != value {
            return Err(FieldNameError::Padded(value));
        }
        if value.chars().any(char::is_control) {
            return Err(FieldNameError::Control(value));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for FieldName {
    type Error = FieldNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for FieldName {
    type Error = FieldNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FieldName> for String {
    fn from(value: FieldName) -> Self {
        value.0
    }
}

impl std::ops::Deref for FieldName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for FieldName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

// Lets `BTreeMap<FieldName, _>` be queried with a plain `&str`.
impl Borrow<str> for FieldName {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Like [`FieldName`], but for `'static` literals. Checked at compile time via
/// `const` assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StaticFieldName(&'static str);

impl StaticFieldName {
    #[must_use]
    pub const fn new(value: &'static str) -> Self {
        assert!(!value.is_empty(), "StaticFieldName must not be empty");
        Self(value)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }

    /// Promote to an owned [`FieldName`].
    #[must_use]
    pub fn to_field(self) -> FieldName {
        FieldName(self.0.to_string())
    }
}

impl PartialEq<str> for StaticFieldName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
