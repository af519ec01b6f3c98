//! Shared test doubles for the audit pipeline

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::entry::AuditLogEntry;
use super::sink::{AuditSink, SinkError, SinkMode};

/// Sink that records every entry it receives.
pub(crate) struct RecordingSink {
    name: &'static str,
    mode: SinkMode,
    entries: Mutex<Vec<AuditLogEntry>>,
}

impl RecordingSink {
    pub(crate) fn new(name: &'static str, mode: SinkMode) -> Self {
        Self {
            name,
            mode,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn writes(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub(crate) fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub(crate) fn last_entry(&self) -> AuditLogEntry {
        self.entries
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no audit entries recorded")
    }
}

#[async_trait]
impl AuditSink for RecordingSink {
    fn name(&self) -> &'static str {
        self.name
    }

    fn mode(&self) -> SinkMode {
        self.mode
    }

    async fn write(&self, entry: &AuditLogEntry) -> Result<(), SinkError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

/// Sink whose writes always fail.
pub(crate) struct FailingSink {
    calls: AtomicU32,
}

impl FailingSink {
    pub(crate) fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuditSink for FailingSink {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn mode(&self) -> SinkMode {
        SinkMode::All
    }

    async fn write(&self, _entry: &AuditLogEntry) -> Result<(), SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Closed)
    }
}
