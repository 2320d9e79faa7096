//! Rules file to running proxy

use std::fs;
use std::sync::Arc;

use gatekeep_config::{ConfigError, GuardConfig};
use gatekeep_core::{Counter, MemorySink, Proxy, SingletonCell};
use gatekeep_types::Value;

use crate::common::field;

const RULES: &str = r#"
[audit]
sink = "tracing"

[[field]]
name = "age"
rules = [{ kind = "numeric" }]

[[field]]
name = "name"
rules = [{ kind = "min_length", value = 2 }]

[[field]]
name = "color"
rules = [{ kind = "one_of", values = ["red", "blue"] }]

[seed]
name = "Alice"
age = 30
"#;

#[test]
fn rules_file_drives_proxy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.toml");
    fs::write(&path, RULES).unwrap();

    let config = GuardConfig::from_path(&path).unwrap();
    let sink = MemorySink::new();
    let mut proxy = Proxy::wrap(
        config.seed_record(),
        config.handler_chain_with(Some(Arc::new(sink.clone()))),
    );

    assert!(proxy.set(&field("age"), Value::from("abc")).is_err());
    assert!(proxy.set(&field("name"), Value::from("A")).is_err());
    assert!(proxy.set(&field("color"), Value::from("green")).is_err());
    assert!(sink.is_empty());

    proxy.set(&field("color"), Value::from("red")).unwrap();
    proxy.set(&field("name"), Value::from("Al")).unwrap();
    assert_eq!(sink.len(), 2);
    assert_eq!(proxy.get("age"), Some(Value::Int(30)));
}

#[test]
fn default_chain_uses_configured_sink() {
    let config = GuardConfig::from_toml_str(RULES).unwrap();
    // three rule sets plus the tracing audit log
    assert_eq!(config.handler_chain().len(), 4);
}

#[test]
fn invalid_rules_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.toml");
    fs::write(&path, "[[field]]\nname = \"age\"\nrules = [{ kind = \"range\", min = 5, max = 1 }]\n").unwrap();

    let err = GuardConfig::from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert_eq!(err.path(), path.as_path());
}

#[test]
fn allow_list_leaves_counter_steps_alone() {
    let config =
        GuardConfig::from_toml_str("[access]\nallow = [\"name\", \"age\"]\n").unwrap();
    let cell = SingletonCell::<Counter>::new();
    let sink = MemorySink::new();
    let mut counter = Proxy::wrap(
        cell.counter(),
        config.counter_chain_with(Some(Arc::new(sink.clone()))),
    );

    counter.increment().unwrap();
    counter.increment().unwrap();
    counter.increment().unwrap();
    counter.decrement().unwrap();
    assert_eq!(counter.count(), Some(2));
    assert_eq!(sink.len(), 4);

    let mut record = Proxy::wrap(config.seed_record(), config.handler_chain_with(None));
    assert!(record.set(&field("count"), Value::Int(1)).unwrap_err().is_rejected());
}
