//! Audit sink abstraction
//!
//! Sinks are assembled once at startup into an immutable list handed to the
//! dispatcher; nothing registers or removes sinks at runtime.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entry::AuditLogEntry;

/// Which intercepted requests a sink receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SinkMode {
    /// Commands only
    WritesOnly,
    /// Commands and queries
    #[default]
    All,
}

impl SinkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WritesOnly => "writes_only",
            Self::All => "all",
        }
    }
}

impl std::fmt::Display for SinkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SinkMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "writes_only" | "writes-only" | "writesonly" => Ok(SinkMode::WritesOnly),
            "all" => Ok(SinkMode::All),
            _ => Err(anyhow::anyhow!("Invalid sink mode: {}", s)),
        }
    }
}

/// Errors reported by sinks.
///
/// These never reach request handlers; the dispatcher logs them and moves
/// on.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("database write failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("sink is closed")]
    Closed,
}

/// A destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Which requests this sink receives. Fixed for the sink's lifetime.
    fn mode(&self) -> SinkMode;

    /// Record one entry.
    async fn write(&self, entry: &AuditLogEntry) -> Result<(), SinkError>;

    /// Flush buffered entries and stop accepting new ones. Called once at
    /// shutdown; subsequent writes return [`SinkError::Closed`].
    async fn close(&self) {}
}
