//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use gatekeep_core::{
    AuditLog, FieldSelector, HandlerChain, MemorySink, MissingFieldNotice, Proxy, Record, Rule,
    RuleSet,
};
use gatekeep_types::{FieldName, Value};

pub fn field(name: &str) -> FieldName {
    FieldName::new(name).expect("test field names are valid")
}

/// `age` must be numeric, `name` at least two characters; every write audited.
pub fn person_chain(sink: &MemorySink) -> HandlerChain {
    HandlerChain::new()
        .with(FieldSelector::Any, MissingFieldNotice)
        .with(field("age"), RuleSet::new([Rule::Numeric]))
        .with(field("name"), RuleSet::new([Rule::MinLength(2)]))
        .with(FieldSelector::Any, AuditLog::new(sink.clone()))
}

pub fn person() -> Record {
    Record::new()
        .with(field("name"), "Alice")
        .with(field("age"), Value::Int(30))
}

pub fn person_proxy(sink: &MemorySink) -> Proxy<Record> {
    Proxy::wrap(person(), person_chain(sink))
}
