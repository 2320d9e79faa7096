//! Rules file loading for Gatekeep.
//!
//! Raw TOML structs (with `Option` fields and `bool` flags) stay private to
//! this crate. They are resolved into [`GuardConfig`] at the parse boundary,
//! so holding a `GuardConfig` means every field name, selector, range, and
//! pattern in it is valid.
//!
//! ```toml
//! [audit]
//! sink = "tracing"
//!
//! [access]
//! allow = ["name", "age"]
//! notice_missing = true
//!
//! [[field]]
//! name = "age"
//! rules = [{ kind = "numeric" }, { kind = "range", min = 0, max = 150 }]
//!
//! [seed]
//! name = "Alice"
//! ```

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use gatekeep_core::{
    AllowList, AuditLog, AuditSink, COUNT_FIELD, FieldSelector, HandlerChain, JsonLinesSink,
    MissingFieldNotice, Record, Rule, RuleSet, SelectorError, TracingSink,
};
use gatekeep_types::{FieldName, FieldNameError, Value};

/// Environment variable that overrides the rules file location.
pub const RULES_PATH_ENV: &str = "GATEKEEP_RULES";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Semantic problems found while resolving the raw file.
#[derive(Debug, Error)]
pub enum InvalidConfig {
    #[error("field entry {index}: {source}")]
    Selector {
        index: usize,
        source: SelectorError,
    },
    #[error("access.allow: {0}")]
    AllowField(FieldNameError),
    #[error("seed: {0}")]
    SeedField(FieldNameError),
    #[error("`{field}`: range bounds must be finite, got {min}..{max}")]
    NonFiniteRange { field: String, min: f64, max: f64 },
    #[error("`{field}`: range min {min} is greater than max {max}")]
    InvertedRange { field: String, min: f64, max: f64 },
    #[error("`{field}`: min_length {min} is greater than max_length {max}")]
    InvertedLength { field: String, min: usize, max: usize },
    #[error("`{field}`: invalid pattern: {source}")]
    Pattern { field: String, source: regex::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Structured `tracing` events.
    #[default]
    Tracing,
    /// JSON lines on stderr, keeping stdout for the session transcript.
    Json,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AllowPolicy {
    #[default]
    Everything,
    Only(Vec<FieldName>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPolicy {
    #[default]
    Silent,
    Notice,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    audit: RawAudit,
    #[serde(default)]
    access: RawAccess,
    #[serde(default, rename = "field")]
    fields: Vec<RawField>,
    #[serde(default)]
    seed: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAudit {
    #[serde(default)]
    sink: SinkKind,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAccess {
    allow: Option<Vec<String>>,
    #[serde(default)]
    notice_missing: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawField {
    name: String,
    #[serde(default)]
    rules: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RawRule {
    Numeric,
    Text,
    MinLength { value: usize },
    MaxLength { value: usize },
    Range { min: f64, max: f64 },
    OneOf { values: Vec<Value> },
    Pattern { regex: String },
}

/// Rules attached to one selector.
#[derive(Debug, Clone)]
pub struct FieldRules {
    selector: FieldSelector,
    rules: Vec<Rule>,
}

impl FieldRules {
    #[must_use]
    pub fn selector(&self) -> &FieldSelector {
        &self.selector
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

/// Validated rules file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "RawConfig")]
pub struct GuardConfig {
    sink: SinkKind,
    allow: AllowPolicy,
    missing: MissingPolicy,
    fields: Vec<FieldRules>,
    seed: Record,
}

impl TryFrom<RawConfig> for GuardConfig {
    type Error = InvalidConfig;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let allow = match raw.access.allow {
            None => AllowPolicy::Everything,
            Some(names) => AllowPolicy::Only(
                names
                    .into_iter()
                    .map(FieldName::new)
                    .collect::<Result<_, _>>()
                    .map_err(InvalidConfig::AllowField)?,
            ),
        };
        let missing = if raw.access.notice_missing {
            MissingPolicy::Notice
        } else {
            MissingPolicy::Silent
        };

        let fields = raw
            .fields
            .into_iter()
            .enumerate()
            .map(|(index, field)| resolve_field(index, field))
            .collect::<Result<_, _>>()?;

        let seed = raw
            .seed
            .into_iter()
            .map(|(name, value)| FieldName::new(name).map(|name| (name, value)))
            .collect::<Result<Record, _>>()
            .map_err(InvalidConfig::SeedField)?;

        Ok(Self {
            sink: raw.audit.sink,
            allow,
            missing,
            fields,
            seed,
        })
    }
}

fn resolve_field(index: usize, raw: RawField) -> Result<FieldRules, InvalidConfig> {
    let selector = FieldSelector::parse(&raw.name)
        .map_err(|source| InvalidConfig::Selector { index, source })?;

    let mut min_len = None;
    let mut max_len = None;
    let mut rules = Vec::with_capacity(raw.rules.len());
    for rule in raw.rules {
        let rule = match rule {
            RawRule::Numeric => Rule::Numeric,
            RawRule::Text => Rule::Text,
            RawRule::MinLength { value } => {
                min_len = Some(value);
                Rule::MinLength(value)
            }
            RawRule::MaxLength { value } => {
                max_len = Some(value);
                Rule::MaxLength(value)
            }
            RawRule::Range { min, max } => {
                if !min.is_finite() || !max.is_finite() {
                    return Err(InvalidConfig::NonFiniteRange {
                        field: raw.name,
                        min,
                        max,
                    });
                }
                if min > max {
                    return Err(InvalidConfig::InvertedRange {
                        field: raw.name,
                        min,
                        max,
                    });
                }
                Rule::Range { min, max }
            }
            RawRule::OneOf { values } => Rule::OneOf(values),
            RawRule::Pattern { regex } => {
                let re = Regex::new(&regex).map_err(|source| InvalidConfig::Pattern {
                    field: raw.name.clone(),
                    source,
                })?;
                Rule::Pattern(re)
            }
        };
        rules.push(rule);
    }

    if let (Some(min), Some(max)) = (min_len, max_len)
        && min > max
    {
        return Err(InvalidConfig::InvertedLength {
            field: raw.name,
            min,
            max,
        });
    }

    Ok(FieldRules { selector, rules })
}

impl GuardConfig {
    /// Load from [`RULES_PATH_ENV`] or `~/.gatekeep/rules.toml`.
    ///
    /// `Ok(None)` when no file exists; callers fall back to defaults.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = Self::path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::from_path(&path).map(Some)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read rules at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match Self::from_toml_str(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), fields = config.fields.len(), "rules loaded");
                Ok(config)
            }
            Err(err) => {
                tracing::warn!("Failed to parse rules at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(RULES_PATH_ENV)
            && !path.is_empty()
        {
            return Some(PathBuf::from(path));
        }
        rules_path()
    }

    #[must_use]
    pub const fn sink_kind(&self) -> SinkKind {
        self.sink
    }

    #[must_use]
    pub fn allow(&self) -> &AllowPolicy {
        &self.allow
    }

    #[must_use]
    pub const fn missing(&self) -> MissingPolicy {
        self.missing
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldRules] {
        &self.fields
    }

    /// Initial contents for the record target.
    #[must_use]
    pub fn seed_record(&self) -> Record {
        self.seed.clone()
    }

    /// The sink named by `[audit] sink`, or `None` when auditing is off.
    #[must_use]
    pub fn audit_sink(&self) -> Option<Arc<dyn AuditSink>> {
        match self.sink {
            SinkKind::Tracing => Some(Arc::new(TracingSink)),
            SinkKind::Json => Some(Arc::new(json_sink())),
            SinkKind::None => None,
        }
    }

    /// Build the record's handler chain using the configured sink.
    #[must_use]
    pub fn handler_chain(&self) -> HandlerChain {
        self.handler_chain_with(self.audit_sink())
    }

    /// Build the record's handler chain with an explicit sink.
    ///
    /// Order: missing-field notice, allow-list, per-field rule sets in file
    /// order, then the audit log.
    #[must_use]
    pub fn handler_chain_with(&self, sink: Option<Arc<dyn AuditSink>>) -> HandlerChain {
        let mut chain = HandlerChain::new();
        if self.missing == MissingPolicy::Notice {
            chain.push(FieldSelector::Any, MissingFieldNotice);
        }
        if let AllowPolicy::Only(fields) = &self.allow {
            chain.push(FieldSelector::Any, AllowList::new(fields.iter().cloned()));
        }
        for field in &self.fields {
            chain.push(field.selector.clone(), RuleSet::new(field.rules.iter().cloned()));
        }
        if let Some(sink) = sink {
            chain.push(FieldSelector::Any, AuditLog::shared(sink));
        }
        chain
    }

    /// Build the counter's handler chain using the configured sink.
    #[must_use]
    pub fn counter_chain(&self) -> HandlerChain {
        self.counter_chain_with(self.audit_sink())
    }

    /// Build the counter's handler chain with an explicit sink.
    ///
    /// The allow-list, the missing-field notice, and wildcard or glob rules
    /// describe the record and are left out. Only rule sets whose selector
    /// names `count` exactly apply, followed by the audit log.
    #[must_use]
    pub fn counter_chain_with(&self, sink: Option<Arc<dyn AuditSink>>) -> HandlerChain {
        let mut chain = HandlerChain::new();
        for field in &self.fields {
            if let FieldSelector::Exact(name) = &field.selector
                && COUNT_FIELD == *name.as_str()
            {
                chain.push(field.selector.clone(), RuleSet::new(field.rules.iter().cloned()));
            }
        }
        if let Some(sink) = sink {
            chain.push(FieldSelector::Any, AuditLog::shared(sink));
        }
        chain
    }
}

fn json_sink() -> JsonLinesSink<io::Stderr> {
    JsonLinesSink::new(io::stderr())
}

fn rules_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".gatekeep").join("rules.toml"))
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex, PoisonError};

    use gatekeep_core::{
        Counter, FieldSelector, Inspect, JsonLinesSink, MemorySink, Proxy, Rule, SingletonCell,
    };
    use gatekeep_types::{FieldName, Value};

    use super::{
        AllowPolicy, ConfigError, GuardConfig, MissingPolicy, RULES_PATH_ENV, SinkKind, json_sink,
        rules_path,
    };

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_rules_env<R>(value: &OsStr, f: impl FnOnce() -> R) -> R {
        let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        unsafe {
            std::env::set_var(RULES_PATH_ENV, value);
        }
        let result = f();
        unsafe {
            std::env::remove_var(RULES_PATH_ENV);
        }
        result
    }

    const SAMPLE: &str = r#"
[audit]
sink = "none"

[access]
allow = ["name", "age"]
notice_missing = true

[[field]]
name = "age"
rules = [{ kind = "numeric" }, { kind = "range", min = 0, max = 150 }]

[[field]]
name = "name"
rules = [{ kind = "min_length", value = 2 }, { kind = "pattern", regex = "^[A-Z]" }]

[seed]
name = "Alice"
age = 30
"#;

    fn field(name: &str) -> FieldName {
        FieldName::new(name).unwrap()
    }

    #[test]
    fn empty_file_is_permissive_default() {
        let config = GuardConfig::from_toml_str("").unwrap();
        assert_eq!(config.sink_kind(), SinkKind::Tracing);
        assert_eq!(config.allow(), &AllowPolicy::Everything);
        assert_eq!(config.missing(), MissingPolicy::Silent);
        assert!(config.fields().is_empty());
        assert!(config.seed_record().is_empty());
    }

    #[test]
    fn parses_sample() {
        let config = GuardConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.sink_kind(), SinkKind::None);
        assert_eq!(
            config.allow(),
            &AllowPolicy::Only(vec![field("name"), field("age")])
        );
        assert_eq!(config.missing(), MissingPolicy::Notice);
        assert_eq!(config.fields().len(), 2);
        assert!(matches!(
            config.fields()[0].rules()[1],
            Rule::Range { min, max } if min == 0.0 && max == 150.0
        ));
        assert_eq!(config.seed_record().get("age"), Some(Value::Int(30)));
    }

    #[test]
    fn chain_enforces_rules_and_audits() {
        let config = GuardConfig::from_toml_str(SAMPLE).unwrap();
        let sink = MemorySink::new();
        let chain = config.handler_chain_with(Some(Arc::new(sink.clone())));
        // notice + allow-list + two rule sets + audit
        assert_eq!(chain.len(), 5);

        let mut proxy = Proxy::wrap(config.seed_record(), chain);
        assert!(proxy.set(&field("age"), Value::from("abc")).is_err());
        assert!(proxy.set(&field("age"), Value::Int(200)).is_err());
        assert!(proxy.set(&field("name"), Value::from("al")).is_err());
        assert!(proxy.set(&field("email"), Value::from("a@b")).is_err());
        assert!(sink.is_empty());

        proxy.set(&field("name"), Value::from("Al")).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(proxy.get("ghost"), None);
    }

    #[test]
    fn glob_field_names_become_patterns() {
        let config = GuardConfig::from_toml_str(
            r#"
[[field]]
name = "user.*"
rules = [{ kind = "text" }]
"#,
        )
        .unwrap();
        assert!(matches!(
            config.fields()[0].selector(),
            FieldSelector::Glob { .. }
        ));
    }

    #[test]
    fn rejects_inverted_range() {
        let err = GuardConfig::from_toml_str(
            r#"
[[field]]
name = "age"
rules = [{ kind = "range", min = 10, max = 1 }]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("greater than max"), "{err}");
    }

    #[test]
    fn rejects_inverted_length_bounds() {
        let err = GuardConfig::from_toml_str(
            r#"
[[field]]
name = "name"
rules = [{ kind = "max_length", value = 1 }, { kind = "min_length", value = 3 }]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("min_length 3"), "{err}");
    }

    #[test]
    fn rejects_bad_entries() {
        for bad in [
            "[[field]]\nname = \"\"\n",
            "[[field]]\nname = \"x\"\nrules = [{ kind = \"even\" }]\n",
            "[[field]]\nname = \"x\"\nrules = [{ kind = \"pattern\", regex = \"(\" }]\n",
            "[access]\nallow = [\" padded\"]\n",
            "[seed]\n\"\" = 1\n",
            "[audit]\nsink = \"syslog\"\n",
            "[unknown]\n",
        ] {
            assert!(GuardConfig::from_toml_str(bad).is_err(), "accepted: {bad}");
        }
    }

    #[test]
    fn from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = GuardConfig::from_path(file.path()).unwrap();
        assert_eq!(config.fields().len(), 2);
    }

    #[test]
    fn from_path_reports_parse_errors_with_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[[field]]\nname = 3\n").unwrap();
        let err = GuardConfig::from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.path(), file.path());
    }

    #[test]
    fn from_path_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = GuardConfig::from_path(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_follows_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = with_rules_env(file.path().as_os_str(), GuardConfig::load)
            .unwrap()
            .expect("rules file exists");
        assert_eq!(config.fields().len(), 2);
    }

    #[test]
    fn load_without_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("rules.toml");
        let loaded = with_rules_env(absent.as_os_str(), GuardConfig::load).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn load_reports_broken_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[access]\nallow = 1\n").unwrap();
        let err = with_rules_env(file.path().as_os_str(), GuardConfig::load).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.path(), file.path());
    }

    #[test]
    fn empty_env_falls_back_to_home() {
        let path = with_rules_env(OsStr::new(""), GuardConfig::path);
        assert_eq!(path, rules_path());
    }

    #[test]
    fn rejects_non_finite_range() {
        for bounds in ["min = nan, max = 1", "min = 0, max = nan", "min = -inf, max = inf"] {
            let toml = format!(
                "[[field]]\nname = \"age\"\nrules = [{{ kind = \"range\", {bounds} }}]\n"
            );
            let err = GuardConfig::from_toml_str(&toml).unwrap_err();
            assert!(err.to_string().contains("must be finite"), "{err}");
        }
    }

    #[test]
    fn json_audit_lines_go_to_stderr() {
        let _sink: JsonLinesSink<io::Stderr> = json_sink();
        let config = GuardConfig::from_toml_str("[audit]\nsink = \"json\"\n").unwrap();
        assert!(config.audit_sink().is_some());
    }

    #[test]
    fn counter_chain_ignores_record_access_rules() {
        let config = GuardConfig::from_toml_str(
            r#"
[access]
allow = ["name", "age"]
notice_missing = true

[[field]]
name = "*"
rules = [{ kind = "text" }]

[[field]]
name = "count"
rules = [{ kind = "range", min = 0, max = 2 }]
"#,
        )
        .unwrap();
        let sink = MemorySink::new();
        let chain = config.counter_chain_with(Some(Arc::new(sink.clone())));
        // `count` range + audit
        assert_eq!(chain.len(), 2);

        let cell = SingletonCell::<Counter>::new();
        let mut counter = Proxy::wrap(cell.counter(), chain);
        assert_eq!(counter.increment(), Ok(1));
        assert_eq!(counter.increment(), Ok(2));
        assert!(counter.increment().is_err());
        assert_eq!(counter.count(), Some(2));
        assert_eq!(sink.len(), 2);
    }
}
