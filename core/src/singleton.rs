//! Construct-once gate for single-instance state.
//!
//! `SingletonCell` wraps a `OnceLock`: the first initializer to run wins,
//! concurrent first callers block until it finishes, and every later caller
//! observes the same value. There is no way to replace the value through a
//! shared reference.

use std::fmt;
use std::sync::OnceLock;

use gatekeep_types::AlreadyConstructed;

pub struct SingletonCell<T> {
    slot: OnceLock<T>,
}

impl<T> SingletonCell<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// Returns the instance, running `init` only if nothing has been built yet.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        self.slot.get_or_init(|| {
            tracing::debug!(kind = std::any::type_name::<T>(), "singleton constructed");
            init()
        })
    }

    /// Explicit construction entry point.
    ///
    /// Succeeds only when this call performs the first construction. If an
    /// instance already exists (or another thread wins the race) `init` is
    /// dropped without running and the caller gets [`AlreadyConstructed`].
    pub fn construct(&self, init: impl FnOnce() -> T) -> Result<&T, AlreadyConstructed> {
        let mut built = false;
        let value = self.get_or_init(|| {
            built = true;
            init()
        });
        if built {
            Ok(value)
        } else {
            tracing::debug!(
                kind = std::any::type_name::<T>(),
                "rejected second construction"
            );
            Err(AlreadyConstructed)
        }
    }

    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.slot.get()
    }

    #[must_use]
    pub fn is_constructed(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Drop the instance so the next access constructs a fresh one.
    ///
    /// Requires exclusive access, so a `static` cell shared by the process can
    /// never be reset. Intended for test harnesses that own their cell.
    pub fn reset(&mut self) -> Option<T> {
        self.slot.take()
    }
}

impl<T> Default for SingletonCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for SingletonCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonCell")
            .field("instance", &self.slot.get())
            .finish()
    }
}
