//! Line-oriented command session.
//!
//! One command per line; every command produces exactly one line of output.
//! Rejected writes are reported and the session continues. The record and the
//! counter sit behind separate proxies, so record access rules (allow-lists,
//! wildcard rules) never block counter steps.

use std::io::{BufRead, Write};

use thiserror::Error;

use gatekeep_core::{CounterHandle, Proxy, Record};
use gatekeep_types::{FieldName, FieldNameError, Value};

pub const HELP: &str = "commands: get F | set F V | fields | inc | dec | count | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Get(String),
    Set(FieldName, Value),
    Fields,
    Increment,
    Decrement,
    Count,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Field(#[from] FieldNameError),
}

impl Command {
    /// `Ok(None)` for blank lines and `#` comments.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));

        let command = match verb {
            "get" => {
                if rest.is_empty() {
                    return Err(CommandError::Usage("get FIELD"));
                }
                Command::Get(rest.to_string())
            }
            "set" => {
                let Some((field, value)) = rest.split_once(char::is_whitespace) else {
                    return Err(CommandError::Usage("set FIELD VALUE"));
                };
                Command::Set(FieldName::new(field)?, Value::parse_literal(value))
            }
            "fields" => Command::Fields,
            "inc" | "increment" => Command::Increment,
            "dec" | "decrement" => Command::Decrement,
            "count" => Command::Count,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

pub struct Session<'c> {
    record: Proxy<Record>,
    counter: Proxy<CounterHandle<'c>>,
}

impl<'c> Session<'c> {
    #[must_use]
    pub fn new(record: Proxy<Record>, counter: Proxy<CounterHandle<'c>>) -> Self {
        Self { record, counter }
    }

    /// Run one command; `None` means the session should end.
    pub fn execute(&mut self, command: Command) -> Option<String> {
        let output = match command {
            Command::Get(field) => match self.record.get(&field) {
                Some(value) => format!("{field} = {value}"),
                None => format!("{field}: not found"),
            },
            Command::Set(field, value) => match self.record.set(&field, value) {
                Ok(entry) => {
                    let old = entry
                        .old_value()
                        .map_or_else(|| "<unset>".to_string(), ToString::to_string);
                    format!("{field}: {old} -> {}", entry.new_value())
                }
                Err(e) => format!("error: {e}"),
            },
            Command::Fields => {
                let names: Vec<String> =
                    self.record.fields().into_iter().map(String::from).collect();
                names.join(" ")
            }
            Command::Increment => step_output(self.counter.increment()),
            Command::Decrement => step_output(self.counter.decrement()),
            Command::Count => self
                .counter
                .count()
                .map_or_else(|| "count: hidden".to_string(), |n| format!("count = {n}")),
            Command::Help => HELP.to_string(),
            Command::Quit => return None,
        };
        Some(output)
    }

    /// Read commands from `input` until EOF or `quit`.
    pub fn run(&mut self, input: impl BufRead, mut output: impl Write) -> anyhow::Result<()> {
        for line in input.lines() {
            let line = line?;
            let reply = match Command::parse(&line) {
                Ok(None) => continue,
                Ok(Some(command)) => match self.execute(command) {
                    Some(reply) => reply,
                    None => break,
                },
                Err(e) => format!("error: {e}"),
            };
            writeln!(output, "{reply}")?;
        }
        output.flush()?;
        Ok(())
    }
}

fn step_output<E: std::fmt::Display>(result: Result<i64, E>) -> String {
    match result {
        Ok(n) => format!("count = {n}"),
        Err(e) => format!("error: {e}"),
    }
}
