//! Proxy targets.
//!
//! [`Inspect`] is the read-only view handlers receive; [`Target`] adds the
//! single write primitive the proxy calls once validation has passed. Keeping
//! the two apart means a handler can look at the target but never write to it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use gatekeep_types::{FieldName, TargetError, Value};

pub trait Inspect {
    /// Current value of `field`, or `None` if the target has no such property.
    fn get(&self, field: &str) -> Option<Value>;

    /// Names of every readable property, in a stable order.
    fn fields(&self) -> Vec<FieldName>;

    fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }
}

pub trait Target: Inspect {
    /// Store `value` under `field`, returning the previous value.
    ///
    /// Must be all-or-nothing: on `Err` the target is unchanged.
    fn set(&mut self, field: &FieldName, value: Value) -> Result<Option<Value>, TargetError>;
}

/// Whether a [`Record`] accepts new fields and kind changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// Any field may be written with any kind of value.
    #[default]
    Open,
    /// Only existing fields may be written, and only with the same kind.
    Fixed,
}

/// A map-backed target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    shape: Shape,
    fields: BTreeMap<FieldName, Value>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A record whose field set and value kinds are frozen to `fields`.
    #[must_use]
    pub fn fixed(fields: impl IntoIterator<Item = (FieldName, Value)>) -> Self {
        Self {
            shape: Shape::Fixed,
            fields: fields.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn with(mut self, field: FieldName, value: impl Into<Value>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    #[must_use]
    pub const fn shape(&self) -> Shape {
        self.shape
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(FieldName, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (FieldName, Value)>>(iter: I) -> Self {
        Self {
            shape: Shape::Open,
            fields: iter.into_iter().collect(),
        }
    }
}

impl Inspect for Record {
    fn get(&self, field: &str) -> Option<Value> {
        self.fields.get(field).cloned()
    }

    fn fields(&self) -> Vec<FieldName> {
        self.fields.keys().cloned().collect()
    }

    fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}

impl Target for Record {
    fn set(&mut self, field: &FieldName, value: Value) -> Result<Option<Value>, TargetError> {
        if self.shape == Shape::Fixed {
            let Some(current) = self.fields.get(field.as_str()) else {
                return Err(TargetError::UnknownField {
                    field: field.clone(),
                });
            };
            if current.kind() != value.kind() {
                return Err(TargetError::TypeMismatch {
                    field: field.clone(),
                    expected: current.kind(),
                    actual: value.kind(),
                });
            }
        }
        Ok(self.fields.insert(field.clone(), value))
    }
}
