//! Audit sinks.
//!
//! The core only defines the entry shape and when entries are produced. Where
//! they end up is the caller's choice of [`AuditSink`]; [`AuditLog`] is the
//! handler that forwards committed writes to one.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use gatekeep_types::AuditLogEntry;

use crate::handler::Handler;
use crate::target::Inspect;

pub trait AuditSink: Send + Sync {
    /// Must not fail the write that produced `entry`; sinks report their own
    /// delivery problems.
    fn record(&self, entry: &AuditLogEntry);
}

impl<S: AuditSink + ?Sized> AuditSink for Arc<S> {
    fn record(&self, entry: &AuditLogEntry) {
        (**self).record(entry);
    }
}

/// Emits one structured `tracing` event per entry on target `gatekeep::audit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, entry: &AuditLogEntry) {
        let old = entry
            .old_value()
            .map_or_else(|| "<unset>".to_string(), ToString::to_string);
        tracing::info!(
            target: "gatekeep::audit",
            field = %entry.field(),
            old = %old,
            new = %entry.new_value(),
            at = %entry.timestamp().to_rfc3339(),
            "write committed"
        );
    }
}

/// In-memory buffer. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<AuditLogEntry>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Take everything recorded so far, leaving the buffer empty.
    pub fn drain(&self) -> Vec<AuditLogEntry> {
        std::mem::take(&mut *self.lock())
    }

    // Entries are appended whole, so a poisoned buffer is still consistent.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditLogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AuditSink for MemorySink {
    fn record(&self, entry: &AuditLogEntry) {
        self.lock().push(entry.clone());
    }
}

/// Writes each entry as one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> AuditSink for JsonLinesSink<W> {
    fn record(&self, entry: &AuditLogEntry) {
        let mut line = match serde_json::to_vec(entry) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(field = %entry.field(), "Failed to encode audit entry: {e}");
                return;
            }
        };
        line.push(b'\n');

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writer.write_all(&line).and_then(|()| writer.flush()) {
            tracing::warn!(field = %entry.field(), "Failed to write audit entry: {e}");
        }
    }
}

/// Handler that forwards every committed write to a sink.
#[derive(Clone)]
pub struct AuditLog {
    sink: Arc<dyn AuditSink>,
}

impl AuditLog {
    pub fn new(sink: impl AuditSink + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    #[must_use]
    pub fn shared(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }
}

impl Handler for AuditLog {
    fn on_write(&self, _target: &dyn Inspect, entry: &AuditLogEntry) {
        self.sink.record(entry);
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog").finish_non_exhaustive()
    }
}
