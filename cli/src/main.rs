//! Gatekeep CLI - command session over the guarded counter and record.
//!
//! ```text
//! main() -> init_tracing() -> load rules -> Session::new(record proxy, counter proxy)
//!                                               |
//!                                               v
//!                                 stdin lines -> Proxy -> stdout
//! ```
//!
//! Logs and JSON audit lines go to stderr (filter via `RUST_LOG`, default
//! `info`) so stdout stays a clean command transcript.

mod session;

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use gatekeep_config::GuardConfig;
use gatekeep_core::{Counter, Proxy};

use crate::session::{HELP, Session};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal()),
        )
        .with(env_filter)
        .init();
}

enum Invocation {
    Run { config: Option<PathBuf> },
    Help,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Invocation> {
    let mut config = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                let Some(path) = args.next() else {
                    bail!("{arg} requires a path");
                };
                config = Some(PathBuf::from(path));
            }
            "-h" | "--help" => return Ok(Invocation::Help),
            other => bail!("unexpected argument `{other}`"),
        }
    }
    Ok(Invocation::Run { config })
}

fn load_config(explicit: Option<PathBuf>) -> Result<GuardConfig> {
    if let Some(path) = explicit {
        return GuardConfig::from_path(&path)
            .with_context(|| format!("loading rules from {}", path.display()));
    }
    match GuardConfig::load() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => {
            tracing::info!("No rules file found; running with an unrestricted chain");
            Ok(GuardConfig::default())
        }
        Err(e) => Err(e).context("loading default rules file"),
    }
}

fn main() -> Result<()> {
    init_tracing();

    let config = match parse_args(std::env::args().skip(1))? {
        Invocation::Help => {
            println!("usage: gatekeep [--config PATH]\n{HELP}");
            return Ok(());
        }
        Invocation::Run { config } => load_config(config)?,
    };

    let sink = config.audit_sink();
    let record_chain = config.handler_chain_with(sink.clone());
    let counter_chain = config.counter_chain_with(sink);
    tracing::debug!(?record_chain, ?counter_chain, "handler chains ready");

    let mut session = Session::new(
        Proxy::wrap(config.seed_record(), record_chain),
        Proxy::wrap(Counter::instance(), counter_chain),
    );
    session.run(io::stdin().lock(), io::stdout().lock())
}
