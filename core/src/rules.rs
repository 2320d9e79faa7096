//! Declarative validation rules and the stock handlers built from them.
//!
//! Rules are pure predicates over the proposed value, so the verdict for a
//! field never depends on the order its rules were listed in. Only the reason
//! reported for a rejection does (first failing rule wins).

use std::collections::BTreeSet;

use regex::Regex;

use gatekeep_types::{FieldName, ValidationRejected, Value};

use crate::handler::{Handler, ReadVerdict};
use crate::target::Inspect;

#[derive(Debug, Clone)]
pub enum Rule {
    /// Value must be an int or float.
    Numeric,
    /// Value must be text.
    Text,
    /// Text must have at least this many characters.
    MinLength(usize),
    MaxLength(usize),
    /// Numeric value must fall within `min..=max`.
    Range { min: f64, max: f64 },
    OneOf(Vec<Value>),
    /// Text must match the expression somewhere; anchor it for a full match.
    Pattern(Regex),
}

impl Rule {
    /// `Err` carries the human-readable reason.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Rule::Numeric => {
                if value.is_numeric() {
                    Ok(())
                } else {
                    Err(format!("expected a number, got {}", value.kind()))
                }
            }
            Rule::Text => value
                .as_text()
                .map(|_| ())
                .ok_or_else(|| format!("expected text, got {}", value.kind())),
            Rule::MinLength(min) => {
                let len = text_len(value)?;
                if len >= *min {
                    Ok(())
                } else {
                    Err(format!("must be at least {min} characters, got {len}"))
                }
            }
            Rule::MaxLength(max) => {
                let len = text_len(value)?;
                if len <= *max {
                    Ok(())
                } else {
                    Err(format!("must be at most {max} characters, got {len}"))
                }
            }
            Rule::Range { min, max } => {
                let Some(x) = value.as_f64() else {
                    return Err(format!("expected a number, got {}", value.kind()));
                };
                if (*min..=*max).contains(&x) {
                    Ok(())
                } else {
                    Err(format!("{x} is outside {min}..={max}"))
                }
            }
            Rule::OneOf(allowed) => {
                if allowed.contains(value) {
                    Ok(())
                } else {
                    Err(format!("{value} is not an allowed value"))
                }
            }
            Rule::Pattern(re) => {
                let Some(text) = value.as_text() else {
                    return Err(format!("expected text, got {}", value.kind()));
                };
                if re.is_match(text) {
                    Ok(())
                } else {
                    Err(format!("does not match /{}/", re.as_str()))
                }
            }
        }
    }
}

fn text_len(value: &Value) -> Result<usize, String> {
    value
        .as_text()
        .map(|s| s.chars().count())
        .ok_or_else(|| format!("expected text, got {}", value.kind()))
}

/// Validator that applies every rule to writes on its selected fields.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    #[must_use]
    pub fn new(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

impl Handler for RuleSet {
    fn validate(
        &self,
        _target: &dyn Inspect,
        field: &FieldName,
        proposed: &Value,
    ) -> Result<(), ValidationRejected> {
        for rule in &self.rules {
            rule.check(proposed)
                .map_err(|reason| ValidationRejected::new(field.clone(), reason))?;
        }
        Ok(())
    }
}

/// Restricts writes to a fixed set of fields. Reads are unaffected.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    allowed: BTreeSet<FieldName>,
}

impl AllowList {
    #[must_use]
    pub fn new(fields: impl IntoIterator<Item = FieldName>) -> Self {
        Self {
            allowed: fields.into_iter().collect(),
        }
    }
}

impl Handler for AllowList {
    fn validate(
        &self,
        _target: &dyn Inspect,
        field: &FieldName,
        _proposed: &Value,
    ) -> Result<(), ValidationRejected> {
        if self.allowed.contains(field) {
            Ok(())
        } else {
            Err(ValidationRejected::new(
                field.clone(),
                "field is not in the writable set",
            ))
        }
    }
}

/// Logs a notice when a caller reads a property the target does not have.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingFieldNotice;

impl Handler for MissingFieldNotice {
    fn on_read(
        &self,
        target: &dyn Inspect,
        field: &FieldName,
        current: Option<&Value>,
    ) -> ReadVerdict {
        if current.is_some() {
            return ReadVerdict::Pass;
        }
        tracing::info!(
            field = %field,
            known = target.fields().len(),
            "property does not exist"
        );
        ReadVerdict::Suppress
    }
}
