//! The intercepting proxy.
//!
//! `Proxy<T>` owns its target and offers the same read/write surface, but every
//! access runs through the handler chain first:
//!
//! ```text
//! read:  Idle -> Observing (on_read x N) -> Idle          => Some(value) | None
//! write: Idle -> Validating (validate x N) -> Rejected    => Err, target untouched
//!                                          -> Accepted    => Target::set, on_write x N
//! ```
//!
//! The target is never handed out, mutably or otherwise; handlers only ever
//! see it as `&dyn Inspect`.

use gatekeep_types::{
    AuditLogEntry, FieldName, PropertyNotFound, ValidationRejected, Value, WriteError,
};

use crate::counter::{COUNT_FIELD, CounterHandle};
use crate::handler::{HandlerChain, ReadVerdict};
use crate::target::{Inspect, Target};

pub struct Proxy<T> {
    target: T,
    chain: HandlerChain,
}

impl<T: Target> Proxy<T> {
    #[must_use]
    pub fn wrap(target: T, chain: HandlerChain) -> Self {
        Self { target, chain }
    }

    /// Read `field` through the chain.
    ///
    /// `None` means the property does not exist or a handler suppressed it.
    /// Missing properties are an ordinary outcome here, not an error.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Value> {
        let Ok(name) = FieldName::new(field) else {
            tracing::debug!(field, "read of invalid field name");
            return None;
        };
        let current = self.target.get(name.as_str());

        // Every matching handler observes the read, even after a suppression.
        let mut verdict = ReadVerdict::Pass;
        for handler in self.chain.matching(&name) {
            if handler.on_read(&self.target, &name, current.as_ref()) == ReadVerdict::Suppress {
                verdict = ReadVerdict::Suppress;
            }
        }

        match verdict {
            ReadVerdict::Pass => current,
            ReadVerdict::Suppress => {
                tracing::debug!(field = %name, "read suppressed");
                None
            }
        }
    }

    /// Like [`get`](Self::get), but a missing property is an error.
    pub fn require(&self, field: &FieldName) -> Result<Value, PropertyNotFound> {
        self.get(field.as_str()).ok_or_else(|| PropertyNotFound {
            field: field.clone(),
        })
    }

    /// Write `value` to `field` through the chain.
    ///
    /// All-or-nothing: on `Err` the target is unchanged and no `on_write` hook
    /// has run. On success the returned entry is the one every hook observed.
    pub fn set(&mut self, field: &FieldName, value: Value) -> Result<AuditLogEntry, WriteError> {
        validate(&self.chain, &self.target, field, &value)?;

        let old = self.target.set(field, value.clone()).inspect_err(|e| {
            tracing::debug!(field = %field, "target refused write: {e}");
        })?;

        let entry = AuditLogEntry::new(field.clone(), old, value);
        self.notify(&entry);
        Ok(entry)
    }

    /// Readable property names of the target.
    #[must_use]
    pub fn fields(&self) -> Vec<FieldName> {
        self.target.fields()
    }

    #[must_use]
    pub fn chain(&self) -> &HandlerChain {
        &self.chain
    }

    fn notify(&self, entry: &AuditLogEntry) {
        for handler in self.chain.matching(entry.field()) {
            handler.on_write(&self.target, entry);
        }
    }
}

/// Guarded access to the counter.
///
/// Steps are validated as a proposed write of the resulting value to
/// [`COUNT_FIELD`], applied atomically, then reported to `on_write` hooks with
/// the actual old and new values. Validators may run more than once when
/// other threads move the counter concurrently, so they must not have side
/// effects.
impl Proxy<CounterHandle<'_>> {
    pub fn increment(&mut self) -> Result<i64, ValidationRejected> {
        self.step(1)
    }

    pub fn decrement(&mut self) -> Result<i64, ValidationRejected> {
        self.step(-1)
    }

    /// Current count as seen through the read hooks; `None` if suppressed.
    #[must_use]
    pub fn count(&self) -> Option<i64> {
        self.get(COUNT_FIELD.as_str()).as_ref().and_then(Value::as_i64)
    }

    fn step(&mut self, delta: i64) -> Result<i64, ValidationRejected> {
        let field = COUNT_FIELD.to_field();
        let (old, new) = self.target.try_step(delta, |next| {
            validate(&self.chain, &self.target, &field, &Value::Int(next))
        })?;

        let entry = AuditLogEntry::new(field, Some(Value::Int(old)), Value::Int(new));
        self.notify(&entry);
        Ok(new)
    }
}

impl<T> std::fmt::Debug for Proxy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("target", &std::any::type_name::<T>())
            .field("chain", &self.chain)
            .finish()
    }
}

fn validate(
    chain: &HandlerChain,
    target: &dyn Inspect,
    field: &FieldName,
    proposed: &Value,
) -> Result<(), ValidationRejected> {
    for handler in chain.matching(field) {
        handler.validate(target, field, proposed).inspect_err(|rejection| {
            tracing::debug!(field = %field, value = %proposed, "{rejection}");
        })?;
    }
    Ok(())
}
