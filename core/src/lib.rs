//! Core logic for Gatekeep.
//!
//! This crate holds the two halves of the guarded state manager:
//!
//! - **`counter`** / **`singleton`**: the process-wide counter behind a
//!   construct-once gate
//! - **`proxy`** / **`handler`** / **`rules`** / **`audit`**: the intercepting
//!   proxy, its handler chain, stock validators, and audit sinks
//!
//! ```
//! use gatekeep_core::{AuditLog, Counter, FieldSelector, HandlerChain, MemorySink, Proxy};
//!
//! let sink = MemorySink::new();
//! let chain = HandlerChain::new().with(FieldSelector::Any, AuditLog::new(sink.clone()));
//! let mut counter = Proxy::wrap(Counter::instance(), chain);
//! counter.increment().unwrap();
//! assert_eq!(sink.len(), 1);
//! ```

pub mod audit;
pub mod counter;
pub mod handler;
pub mod proxy;
pub mod rules;
pub mod singleton;
pub mod target;

pub use audit::{AuditLog, AuditSink, JsonLinesSink, MemorySink, TracingSink};
pub use counter::{COUNT_FIELD, Counter, CounterHandle};
pub use handler::{FieldSelector, Handler, HandlerChain, Hooks, ReadVerdict, SelectorError};
pub use proxy::Proxy;
pub use rules::{AllowList, MissingFieldNotice, Rule, RuleSet};
pub use singleton::SingletonCell;
pub use target::{Inspect, Record, Shape, Target};
