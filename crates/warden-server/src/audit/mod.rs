//! Audit pipeline
//!
//! Every intercepted command and query produces an [`AuditLogEntry`] that
//! is fanned out to a fixed set of sinks:
//!
//! - [`DatabaseSink`]: synchronous write to the `audit_log` table, always on
//! - [`NetworkSink`]: non-blocking, queue-backed forwarding to a collector
//! - [`TraceSink`]: structured log records correlated with the active trace
//!
//! The sink list is assembled once at startup from
//! [`AuditConfig`](crate::config::AuditConfig) and never changes afterwards.
//! Sink failures are logged and contained; request handlers never see them.
//!
//! # Usage
//!
//! ```no_run
//! use sqlx::PgPool;
//! use warden_server::audit;
//! use warden_server::config::AuditConfig;
//!
//! # async fn example(pool: PgPool, config: AuditConfig) {
//! let sinks = audit::build_sinks(&config, pool);
//! // ... hand the list to the dispatcher ...
//! audit::close_sinks(&sinks).await;
//! # }
//! ```
//!
//! # Example: Building an Entry
//!
//! ```
//! use warden_server::audit::{AuditLogEntry, RequestKind};
//!
//! let entry = AuditLogEntry::builder()
//!     .category("users.commands.create")
//!     .request_kind(RequestKind::Command)
//!     .request_payload(serde_json::json!({ "email": "a@b.c" }))
//!     .success(true)
//!     .duration_ms(12)
//!     .build();
//! assert!(entry.response_payload.is_none());
//! ```

mod db_sink;
mod entry;
mod net_sink;
mod queries;
mod queue;
mod sink;
mod trace_sink;

#[cfg(test)]
pub(crate) mod test_support;

pub use db_sink::DatabaseSink;
pub use entry::{
    derive_log_name, payload_json, AuditLogEntry, AuditLogEntryBuilder, RequestKind,
    MAX_RESPONSE_PAYLOAD_DEPTH, TRUNCATED_PLACEHOLDER, UNSERIALIZABLE_PLACEHOLDER,
};
pub use net_sink::NetworkSink;
pub use queries::{
    query_audit_logs, AuditLogQuery, AuditLogRecord, DEFAULT_AUDIT_QUERY_LIMIT,
    MAX_AUDIT_QUERY_LIMIT,
};
pub use sink::{AuditSink, SinkError, SinkMode};
pub use trace_sink::TraceSink;

use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use crate::config::AuditConfig;

/// Assemble the sink list from configuration.
///
/// The database sink is unconditional; the network and trace sinks join
/// when enabled. Must be called from within a tokio runtime because the
/// network sink spawns its forwarder on construction.
pub fn build_sinks(config: &AuditConfig, pool: PgPool) -> Vec<Arc<dyn AuditSink>> {
    let mut sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(DatabaseSink::new(pool))];

    if config.network.enabled {
        sinks.push(Arc::new(NetworkSink::new(&config.network)));
    }
    if config.trace.enabled {
        sinks.push(Arc::new(TraceSink::new(config.trace.mode)));
    }

    let names: Vec<&str> = sinks.iter().map(|s| s.name()).collect();
    info!(sinks = ?names, "Audit pipeline assembled");

    sinks
}

/// Close every sink in order, flushing buffered entries.
pub async fn close_sinks(sinks: &[Arc<dyn AuditSink>]) {
    for sink in sinks {
        sink.close().await;
    }
    info!("Audit sinks closed");
}
