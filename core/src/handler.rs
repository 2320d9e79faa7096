//! Interception handlers and the ordered chain the proxy runs them from.
//!
//! A [`Handler`] may observe reads, veto writes, and observe committed writes.
//! Every hook has a pass-through default, so a handler implements only the
//! capabilities it needs. Handlers receive the target as `&dyn Inspect` and
//! therefore cannot modify it.

use std::fmt;
use std::sync::Arc;

use globset::{Glob, GlobMatcher};
use thiserror::Error;

use gatekeep_types::{AuditLogEntry, FieldName, FieldNameError, ValidationRejected, Value};

use crate::target::Inspect;

/// What a read hook wants the proxy to do with the value it observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadVerdict {
    #[default]
    Pass,
    /// Hide the value; the read yields `None`.
    Suppress,
}

pub trait Handler: Send + Sync {
    fn on_read(
        &self,
        _target: &dyn Inspect,
        _field: &FieldName,
        _current: Option<&Value>,
    ) -> ReadVerdict {
        ReadVerdict::Pass
    }

    fn validate(
        &self,
        _target: &dyn Inspect,
        _field: &FieldName,
        _proposed: &Value,
    ) -> Result<(), ValidationRejected> {
        Ok(())
    }

    /// Runs after the target accepted the write.
    fn on_write(&self, _target: &dyn Inspect, _entry: &AuditLogEntry) {}
}

#[derive(Debug, Error)]
pub enum SelectorError {
    #[error(transparent)]
    Field(#[from] FieldNameError),
    #[error("invalid field pattern: {0}")]
    Glob(#[from] globset::Error),
}

/// Which fields a chain entry applies to.
#[derive(Debug, Clone)]
pub enum FieldSelector {
    /// `"*"`: every field.
    Any,
    Exact(FieldName),
    Glob { pattern: String, matcher: GlobMatcher },
}

impl FieldSelector {
    /// `"*"` selects everything, a string with glob metacharacters becomes a
    /// pattern, anything else must be a valid [`FieldName`].
    pub fn parse(raw: &str) -> Result<Self, SelectorError> {
        if raw == "*" {
            return Ok(FieldSelector::Any);
        }
        if raw.contains(['*', '?', '[', '{']) {
            let matcher = Glob::new(raw)?.compile_matcher();
            return Ok(FieldSelector::Glob {
                pattern: raw.to_string(),
                matcher,
            });
        }
        Ok(FieldSelector::Exact(FieldName::new(raw)?))
    }

    #[must_use]
    pub fn matches(&self, field: &FieldName) -> bool {
        match self {
            FieldSelector::Any => true,
            FieldSelector::Exact(name) => name == field,
            FieldSelector::Glob { matcher, .. } => matcher.is_match(field.as_str()),
        }
    }
}

impl From<FieldName> for FieldSelector {
    fn from(value: FieldName) -> Self {
        FieldSelector::Exact(value)
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSelector::Any => f.write_str("*"),
            FieldSelector::Exact(name) => f.write_str(name.as_str()),
            FieldSelector::Glob { pattern, .. } => f.write_str(pattern),
        }
    }
}

#[derive(Clone)]
struct HandlerEntry {
    selector: FieldSelector,
    handler: Arc<dyn Handler>,
}

/// Handlers in registration order. Cheap to clone; entries are shared.
#[derive(Clone, Default)]
pub struct HandlerChain {
    entries: Vec<HandlerEntry>,
}

impl HandlerChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, selector: impl Into<FieldSelector>, handler: impl Handler + 'static) {
        self.push_shared(selector, Arc::new(handler));
    }

    pub fn push_shared(&mut self, selector: impl Into<FieldSelector>, handler: Arc<dyn Handler>) {
        self.entries.push(HandlerEntry {
            selector: selector.into(),
            handler,
        });
    }

    #[must_use]
    pub fn with(
        mut self,
        selector: impl Into<FieldSelector>,
        handler: impl Handler + 'static,
    ) -> Self {
        self.push(selector, handler);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handlers whose selector matches `field`, in registration order.
    pub fn matching<'a>(
        &'a self,
        field: &'a FieldName,
    ) -> impl Iterator<Item = &'a dyn Handler> {
        self.entries
            .iter()
            .filter(move |entry| entry.selector.matches(field))
            .map(|entry| entry.handler.as_ref())
    }
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.selector.to_string()))
            .finish()
    }
}

type ReadHook =
    Box<dyn Fn(&dyn Inspect, &FieldName, Option<&Value>) -> ReadVerdict + Send + Sync>;
type ValidateHook =
    Box<dyn Fn(&dyn Inspect, &FieldName, &Value) -> Result<(), String> + Send + Sync>;
type WriteHook = Box<dyn Fn(&dyn Inspect, &AuditLogEntry) + Send + Sync>;

/// Closure-backed handler for one-off `{on_read, validate, on_write}` entries.
#[derive(Default)]
pub struct Hooks {
    on_read: Option<ReadHook>,
    validate: Option<ValidateHook>,
    on_write: Option<WriteHook>,
}

impl Hooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_read(
        mut self,
        hook: impl Fn(&dyn Inspect, &FieldName, Option<&Value>) -> ReadVerdict
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.on_read = Some(Box::new(hook));
        self
    }

    /// `hook` returns the rejection reason on `Err`.
    #[must_use]
    pub fn validate(
        mut self,
        hook: impl Fn(&dyn Inspect, &FieldName, &Value) -> Result<(), String>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.validate = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_write(
        mut self,
        hook: impl Fn(&dyn Inspect, &AuditLogEntry) + Send + Sync + 'static,
    ) -> Self {
        self.on_write = Some(Box::new(hook));
        self
    }
}

impl Handler for Hooks {
    fn on_read(
        &self,
        target: &dyn Inspect,
        field: &FieldName,
        current: Option<&Value>,
    ) -> ReadVerdict {
        self.on_read
            .as_ref()
            .map_or(ReadVerdict::Pass, |hook| hook(target, field, current))
    }

    fn validate(
        &self,
        target: &dyn Inspect,
        field: &FieldName,
        proposed: &Value,
    ) -> Result<(), ValidationRejected> {
        match &self.validate {
            Some(hook) => hook(target, field, proposed)
                .map_err(|reason| ValidationRejected::new(field.clone(), reason)),
            None => Ok(()),
        }
    }

    fn on_write(&self, target: &dyn Inspect, entry: &AuditLogEntry) {
        if let Some(hook) = &self.on_write {
            hook(target, entry);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_read", &self.on_read.is_some())
            .field("validate", &self.validate.is_some())
            .field("on_write", &self.on_write.is_some())
            .finish()
    }
}
