//! Relational audit sink

use async_trait::async_trait;
use sqlx::PgPool;

use super::entry::AuditLogEntry;
use super::queries;
use super::sink::{AuditSink, SinkError, SinkMode};

/// Sink writing entries to the `audit_log` table on the caller's task.
///
/// Always present, and fixed to [`SinkMode::WritesOnly`]: the relational
/// trail records state changes only.
pub struct DatabaseSink {
    pool: PgPool,
}

impl DatabaseSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for DatabaseSink {
    fn name(&self) -> &'static str {
        "database"
    }

    fn mode(&self) -> SinkMode {
        SinkMode::WritesOnly
    }

    async fn write(&self, entry: &AuditLogEntry) -> Result<(), SinkError> {
        queries::insert_entry(&self.pool, entry).await?;
        Ok(())
    }
}
