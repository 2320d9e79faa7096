//! Proxy behaviour against map-backed and user-defined targets

use std::sync::{Arc, Mutex};

use gatekeep_core::{
    Counter, FieldSelector, HandlerChain, Hooks, Inspect, MemorySink, Proxy, ReadVerdict,
    SingletonCell, Target,
};
use gatekeep_types::{FieldName, TargetError, Value, WriteError};

use crate::common::{field, person_proxy};

#[test]
fn rejected_age_leaves_target_unchanged() {
    let sink = MemorySink::new();
    let mut proxy = person_proxy(&sink);

    let err = proxy.set(&field("age"), Value::from("abc")).unwrap_err();
    match err {
        WriteError::Rejected(rejection) => assert_eq!(rejection.field(), &field("age")),
        WriteError::Target(other) => panic!("expected a validation rejection, got {other}"),
    }
    assert_eq!(proxy.get("age"), Some(Value::Int(30)));
    assert!(sink.is_empty());
}

#[test]
fn name_length_gate_and_single_audit_entry() {
    let sink = MemorySink::new();
    let mut proxy = person_proxy(&sink);

    assert!(proxy.set(&field("name"), Value::from("A")).unwrap_err().is_rejected());
    proxy.set(&field("name"), Value::from("Al")).unwrap();

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].field(), &field("name"));
    assert_eq!(entries[0].old_value(), Some(&Value::from("Alice")));
    assert_eq!(entries[0].new_value(), &Value::from("Al"));
}

#[test]
fn missing_property_is_soft() {
    let sink = MemorySink::new();
    let proxy = person_proxy(&sink);

    assert_eq!(proxy.get("nickname"), None);
    assert!(proxy.require(&field("nickname")).is_err());
    assert!(sink.is_empty());
}

#[test]
fn valid_write_round_trips() {
    let sink = MemorySink::new();
    let mut proxy = person_proxy(&sink);

    for (name, value) in [
        ("age", Value::Int(41)),
        ("name", Value::from("Bob")),
        ("active", Value::Bool(true)),
    ] {
        proxy.set(&field(name), value.clone()).unwrap();
        assert_eq!(proxy.get(name), Some(value));
    }
    assert_eq!(sink.len(), 3);
}

#[test]
fn on_write_sees_committed_state() {
    let observed = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&observed);
    let chain = HandlerChain::new().with(
        FieldSelector::Any,
        Hooks::new().on_write(move |target, entry| {
            *slot.lock().unwrap() = target.get(entry.field().as_str());
        }),
    );
    let mut proxy = Proxy::wrap(crate::common::person(), chain);
    proxy.set(&field("age"), Value::Int(5)).unwrap();
    assert_eq!(*observed.lock().unwrap(), Some(Value::Int(5)));
}

#[test]
fn read_hooks_can_redact() {
    let chain = HandlerChain::new().with(
        FieldSelector::parse("secret.*").unwrap(),
        Hooks::new().on_read(|_, _, _| ReadVerdict::Suppress),
    );
    let record = crate::common::person().with(field("secret.token"), "abc");
    let proxy = Proxy::wrap(record, chain);
    assert_eq!(proxy.get("secret.token"), None);
    assert_eq!(proxy.get("name"), Some(Value::from("Alice")));
}

/// A hand-written target with a fixed shape.
struct Thermostat {
    setpoint: i64,
}

impl Inspect for Thermostat {
    fn get(&self, field: &str) -> Option<Value> {
        (field == "setpoint").then_some(Value::Int(self.setpoint))
    }

    fn fields(&self) -> Vec<FieldName> {
        vec![field("setpoint")]
    }
}

impl Target for Thermostat {
    fn set(&mut self, name: &FieldName, value: Value) -> Result<Option<Value>, TargetError> {
        if name.as_str() != "setpoint" {
            return Err(TargetError::UnknownField {
                field: name.clone(),
            });
        }
        let Some(next) = value.as_i64() else {
            return Err(TargetError::TypeMismatch {
                field: name.clone(),
                expected: "int",
                actual: value.kind(),
            });
        };
        let old = std::mem::replace(&mut self.setpoint, next);
        Ok(Some(Value::Int(old)))
    }
}

#[test]
fn custom_target_refusals_surface_as_target_errors() {
    let sink = MemorySink::new();
    let mut proxy = Proxy::wrap(
        Thermostat { setpoint: 20 },
        crate::common::person_chain(&sink),
    );

    let err = proxy.set(&field("mode"), Value::from("eco")).unwrap_err();
    assert!(matches!(err, WriteError::Target(TargetError::UnknownField { .. })));

    let entry = proxy.set(&field("setpoint"), Value::Int(22)).unwrap();
    assert_eq!(entry.old_value(), Some(&Value::Int(20)));
    assert_eq!(proxy.get("setpoint"), Some(Value::Int(22)));
    assert_eq!(sink.len(), 1);
}

#[test]
fn counter_proxy_scenario() {
    let cell = SingletonCell::<Counter>::new();
    let sink = MemorySink::new();
    let mut proxy = Proxy::wrap(cell.counter(), crate::common::person_chain(&sink));

    assert_eq!(proxy.count(), Some(0));
    proxy.increment().unwrap();
    proxy.increment().unwrap();
    proxy.increment().unwrap();
    proxy.decrement().unwrap();
    assert_eq!(proxy.count(), Some(2));
    assert_eq!(sink.len(), 4);

    let err = proxy.set(&field("count"), Value::Int(0)).unwrap_err();
    assert!(matches!(err, WriteError::Target(TargetError::Frozen { .. })));
    assert_eq!(proxy.count(), Some(2));
    assert_eq!(proxy.get("label"), None);
}
