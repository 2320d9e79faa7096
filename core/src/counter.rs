//! The process-wide counter.
//!
//! `Counter` has no public constructor. The only ways to reach one are
//! [`Counter::instance`] (lazy, never fails) and [`Counter::construct`]
//! (explicit, fails with [`AlreadyConstructed`] unless it performs the first
//! build).
//!
//! Test harnesses that need an isolated counter can build one in a
//! caller-owned [`SingletonCell<Counter>`], but only with the `test-util`
//! feature enabled. Normal builds cannot obtain a second instance:
//!
#![cfg_attr(not(feature = "test-util"), doc = "```compile_fail,E0599")]
#![cfg_attr(feature = "test-util", doc = "```ignore")]
//! use gatekeep_core::{Counter, SingletonCell};
//!
//! let cell = SingletonCell::<Counter>::new();
//! let second = cell.counter();
//! assert!(!second.same_instance(&Counter::instance()));
//! ```
//!
//! The shape is fixed: `count` is the only observable field and it only moves
//! through [`Counter::increment`] and [`Counter::decrement`]. Arithmetic wraps
//! at the `i64` bounds, like the underlying atomic.

use std::fmt;
use std::ops::Deref;
use std::ptr;
use std::sync::atomic::{AtomicI64, Ordering};

use gatekeep_types::{AlreadyConstructed, FieldName, StaticFieldName, TargetError, Value};

use crate::singleton::SingletonCell;
use crate::target::{Inspect, Target};

/// Name under which the counter value is exposed to handlers.
pub const COUNT_FIELD: StaticFieldName = StaticFieldName::new("count");

static COUNTER: SingletonCell<Counter> = SingletonCell::new();

pub struct Counter {
    value: AtomicI64,
}

impl Counter {
    fn new() -> Self {
        Self {
            value: AtomicI64::new(0),
        }
    }

    /// The process-wide instance, built on first call.
    #[must_use]
    pub fn instance() -> CounterHandle<'static> {
        CounterHandle(COUNTER.get_or_init(Counter::new))
    }

    /// Build the process-wide instance directly.
    ///
    /// Only the very first construction in the process succeeds; after any
    /// call to [`Counter::instance`] this always fails.
    pub fn construct() -> Result<CounterHandle<'static>, AlreadyConstructed> {
        COUNTER.construct(Counter::new).map(CounterHandle)
    }

    /// Atomically add one and return the new value.
    pub fn increment(&self) -> i64 {
        self.value.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Atomically subtract one and return the new value. No floor.
    pub fn decrement(&self) -> i64 {
        self.value.fetch_sub(1, Ordering::SeqCst).wrapping_sub(1)
    }

    #[must_use]
    pub fn count(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Move the counter by `delta` only if `check` accepts the resulting value.
    ///
    /// `check` sees the value the counter would hold and runs again if another
    /// thread moved the counter in between, so the accepted value is always the
    /// one stored. Returns `(old, new)`.
    pub(crate) fn try_step<E>(
        &self,
        delta: i64,
        mut check: impl FnMut(i64) -> Result<(), E>,
    ) -> Result<(i64, i64), E> {
        let mut current = self.value.load(Ordering::SeqCst);
        loop {
            let next = current.wrapping_add(delta);
            check(next)?;
            match self.value.compare_exchange_weak(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok((current, next)),
                Err(actual) => current = actual,
            }
        }
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter")
            .field("count", &self.count())
            .finish()
    }
}

/// Isolated counters for test harnesses.
#[cfg(any(test, feature = "test-util"))]
impl SingletonCell<Counter> {
    /// The counter owned by this cell, built on first call.
    pub fn counter(&self) -> CounterHandle<'_> {
        CounterHandle(self.get_or_init(Counter::new))
    }

    pub fn construct_counter(&self) -> Result<CounterHandle<'_>, AlreadyConstructed> {
        self.construct(Counter::new).map(CounterHandle)
    }
}

/// Shared handle to a [`Counter`]. Copies all refer to the same state.
#[derive(Clone, Copy)]
pub struct CounterHandle<'a>(&'a Counter);

impl CounterHandle<'_> {
    /// True when both handles point at the same underlying counter.
    #[must_use]
    pub fn same_instance(&self, other: &CounterHandle<'_>) -> bool {
        ptr::eq(self.0, other.0)
    }
}

impl Deref for CounterHandle<'_> {
    type Target = Counter;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl fmt::Debug for CounterHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CounterHandle")
            .field(&ptr::from_ref(self.0))
            .field(&self.0.count())
            .finish()
    }
}

impl Inspect for CounterHandle<'_> {
    fn get(&self, field: &str) -> Option<Value> {
        (COUNT_FIELD == *field).then(|| Value::Int(self.count()))
    }

    fn fields(&self) -> Vec<FieldName> {
        vec![COUNT_FIELD.to_field()]
    }
}

// Assignment is never allowed: `count` moves only through increment and
// decrement, and no property can be added.
impl Target for CounterHandle<'_> {
    fn set(&mut self, field: &FieldName, _value: Value) -> Result<Option<Value>, TargetError> {
        Err(TargetError::Frozen {
            field: field.clone(),
        })
    }
}
