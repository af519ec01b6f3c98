//! Trace-correlated logging sink
//!
//! Emits audit entries through the active tracing subscriber so they are
//! batched and shipped with the rest of the host's logs. When a sampled
//! span is active, the record carries its trace and span ids for
//! correlation with distributed traces.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::entry::AuditLogEntry;
use super::sink::{AuditSink, SinkError, SinkMode};
use crate::telemetry;

pub struct TraceSink {
    mode: SinkMode,
}

impl TraceSink {
    pub fn new(mode: SinkMode) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl AuditSink for TraceSink {
    fn name(&self) -> &'static str {
        "trace"
    }

    fn mode(&self) -> SinkMode {
        self.mode
    }

    async fn write(&self, entry: &AuditLogEntry) -> Result<(), SinkError> {
        let trace_id = telemetry::current_trace_id();
        let span_id = telemetry::current_span_id();

        if entry.success {
            info!(
                target: "warden_audit::trace",
                id = %entry.id,
                category = %entry.category,
                kind = %entry.request_kind,
                user = entry.user_email.as_deref().unwrap_or("anonymous"),
                ip = entry.ip_address.as_deref().unwrap_or("unknown"),
                entity = %entry.entity_id.map(|id| id.to_string()).unwrap_or_else(|| "none".to_string()),
                duration_ms = entry.duration_ms,
                timestamp = %entry.timestamp,
                trace_id = trace_id.as_deref().unwrap_or("none"),
                span_id = span_id.as_deref().unwrap_or("none"),
                "Audit entry"
            );
        } else {
            warn!(
                target: "warden_audit::trace",
                id = %entry.id,
                category = %entry.category,
                kind = %entry.request_kind,
                user = entry.user_email.as_deref().unwrap_or("anonymous"),
                ip = entry.ip_address.as_deref().unwrap_or("unknown"),
                entity = %entry.entity_id.map(|id| id.to_string()).unwrap_or_else(|| "none".to_string()),
                duration_ms = entry.duration_ms,
                timestamp = %entry.timestamp,
                trace_id = trace_id.as_deref().unwrap_or("none"),
                span_id = span_id.as_deref().unwrap_or("none"),
                "Audit entry for failed request"
            );
        }

        if let Some(payload) = &entry.response_payload {
            debug!(
                target: "warden_audit::trace",
                id = %entry.id,
                payload = %payload,
                "Audit entry response payload"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::RequestKind;

    fn entry(success: bool) -> AuditLogEntry {
        AuditLogEntry::builder()
            .category("users.queries.get")
            .request_kind(RequestKind::Query)
            .request_payload(serde_json::Value::Null)
            .success(success)
            .duration_ms(3)
            .build()
    }

    #[tokio::test]
    async fn test_write_never_fails() {
        let sink = TraceSink::new(SinkMode::All);
        assert!(sink.write(&entry(true)).await.is_ok());
        assert!(sink.write(&entry(false)).await.is_ok());
    }

    #[test]
    fn test_mode_is_configurable() {
        assert_eq!(TraceSink::new(SinkMode::WritesOnly).mode(), SinkMode::WritesOnly);
        assert_eq!(TraceSink::new(SinkMode::All).mode(), SinkMode::All);
        assert_eq!(TraceSink::new(SinkMode::All).name(), "trace");
    }
}
