//! Non-blocking network audit sink
//!
//! Writes append to a bounded in-memory queue and return immediately; a
//! single background task drains the queue and forwards entries toward the
//! configured collector endpoint. The caller's request path never waits on
//! the network.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::entry::AuditLogEntry;
use super::queue::EntryQueue;
use super::sink::{AuditSink, SinkError, SinkMode};
use crate::config::NetworkAuditConfig;

type ForwardFn = Arc<dyn Fn(&str, &AuditLogEntry) + Send + Sync>;

/// Queue-backed sink with a supervised background forwarder.
pub struct NetworkSink {
    queue: Arc<EntryQueue>,
    mode: SinkMode,
    grace: Duration,
    cancel: CancellationToken,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl NetworkSink {
    /// Start the sink and its background forwarder.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: &NetworkAuditConfig) -> Self {
        Self::with_forwarder(config, Arc::new(forward_as_log))
    }

    fn with_forwarder(config: &NetworkAuditConfig, forward: ForwardFn) -> Self {
        let queue = Arc::new(EntryQueue::new(config.queue_capacity));
        let cancel = CancellationToken::new();

        let worker = tokio::spawn({
            let queue = queue.clone();
            let cancel = cancel.clone();
            let endpoint = config.endpoint.clone();
            async move {
                loop {
                    let drain = drain_queue(
                        queue.clone(),
                        cancel.clone(),
                        endpoint.clone(),
                        forward.clone(),
                    );
                    match AssertUnwindSafe(drain).catch_unwind().await {
                        Ok(()) => break,
                        Err(panic) => {
                            error!(
                                reason = panic_text(panic.as_ref()),
                                "Audit forwarder crashed, restarting"
                            );
                        },
                    }
                }
            }
        });

        Self {
            queue,
            mode: config.mode,
            grace: Duration::from_secs(config.shutdown_grace_secs),
            cancel,
            worker: tokio::sync::Mutex::new(Some(worker)),
        }
    }

    /// Number of entries evicted by queue overflow since startup.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }
}

#[async_trait]
impl AuditSink for NetworkSink {
    fn name(&self) -> &'static str {
        "network"
    }

    fn mode(&self) -> SinkMode {
        self.mode
    }

    async fn write(&self, entry: &AuditLogEntry) -> Result<(), SinkError> {
        self.queue.push(entry.clone())
    }

    async fn close(&self) {
        let handle = { self.worker.lock().await.take() };
        let Some(handle) = handle else { return };

        self.queue.close();
        self.cancel.cancel();

        let abort = handle.abort_handle();
        match tokio::time::timeout(self.grace, handle).await {
            Ok(Ok(())) => debug!("Audit forwarder drained and stopped"),
            Ok(Err(e)) => warn!(error = %e, "Audit forwarder task failed during shutdown"),
            Err(_) => {
                abort.abort();
                warn!(
                    discarded = self.queue.len(),
                    grace_secs = self.grace.as_secs(),
                    "Audit forwarder exceeded shutdown grace, discarding backlog"
                );
            },
        }
    }
}

/// Consume the queue until it is closed and empty or the token fires.
///
/// On cancellation the remaining backlog is flushed synchronously; the
/// shutdown grace period in [`NetworkSink::close`] bounds how long that may
/// take.
async fn drain_queue(
    queue: Arc<EntryQueue>,
    cancel: CancellationToken,
    endpoint: String,
    forward: ForwardFn,
) {
    let mut forwarded: u64 = 0;
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                while let Some(entry) = queue.try_pop() {
                    forward(&endpoint, &entry);
                    forwarded += 1;
                }
                break;
            }
            entry = queue.pop() => match entry {
                Some(entry) => {
                    forward(&endpoint, &entry);
                    forwarded += 1;
                },
                None => break,
            }
        }
    }
    info!(total = forwarded, "Audit forwarder stopped");
}

/// Emit one entry as a structured log record tagged with the collector
/// endpoint, in the shape the downstream shipper expects.
fn forward_as_log(endpoint: &str, entry: &AuditLogEntry) {
    info!(
        target: "warden_audit::network",
        endpoint = endpoint,
        id = %entry.id,
        category = %entry.category,
        kind = %entry.request_kind,
        user = entry.user_email.as_deref().unwrap_or("anonymous"),
        ip = entry.ip_address.as_deref().unwrap_or("unknown"),
        entity = %entry.entity_id.map(|id| id.to_string()).unwrap_or_else(|| "none".to_string()),
        success = entry.success,
        duration_ms = entry.duration_ms,
        timestamp = %entry.timestamp,
        "Forwarding audit entry"
    );
    debug!(
        target: "warden_audit::network",
        id = %entry.id,
        payload = %entry.request_payload,
        "Audit entry payload"
    );
}

fn panic_text(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(text) = panic.downcast_ref::<&'static str>() {
        text
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::RequestKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config(queue_capacity: usize) -> NetworkAuditConfig {
        NetworkAuditConfig {
            enabled: true,
            endpoint: "http://localhost:4318/v1/logs".to_string(),
            mode: SinkMode::All,
            queue_capacity,
            shutdown_grace_secs: 5,
        }
    }

    fn entry(category: &str) -> AuditLogEntry {
        AuditLogEntry::builder()
            .category(category)
            .request_kind(RequestKind::Command)
            .request_payload(serde_json::Value::Null)
            .success(true)
            .duration_ms(1)
            .build()
    }

    fn counting_forwarder(delivered: Arc<AtomicU32>) -> ForwardFn {
        Arc::new(move |_endpoint, _entry| {
            delivered.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_entries_are_forwarded_before_close_returns() {
        let delivered = Arc::new(AtomicU32::new(0));
        let sink = NetworkSink::with_forwarder(&config(16), counting_forwarder(delivered.clone()));

        for i in 0..5 {
            sink.write(&entry(&format!("users.commands.op{i}"))).await.unwrap();
        }
        sink.close().await;

        assert_eq!(delivered.load(Ordering::SeqCst), 5);
        assert_eq!(sink.dropped(), 0);
    }

    #[tokio::test]
    async fn test_write_after_close_is_rejected() {
        let sink = NetworkSink::with_forwarder(&config(4), Arc::new(|_, _| {}));
        sink.close().await;

        let result = sink.write(&entry("users.commands.create")).await;
        assert!(matches!(result, Err(SinkError::Closed)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let sink = NetworkSink::with_forwarder(&config(4), Arc::new(|_, _| {}));
        sink.close().await;
        sink.close().await;
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest_and_counts() {
        let delivered = Arc::new(AtomicU32::new(0));
        // The forwarder task only runs once this test task awaits, so all
        // three writes land before anything is consumed.
        let sink = NetworkSink::with_forwarder(&config(2), counting_forwarder(delivered.clone()));

        sink.write(&entry("a")).await.unwrap();
        sink.write(&entry("b")).await.unwrap();
        sink.write(&entry("c")).await.unwrap();
        sink.close().await;

        assert_eq!(sink.dropped(), 1);
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_forwarder_restarts_after_panic() {
        let attempts = Arc::new(AtomicU32::new(0));
        let delivered = Arc::new(AtomicU32::new(0));
        let sink = NetworkSink::with_forwarder(&config(8), {
            let attempts = attempts.clone();
            let delivered = delivered.clone();
            Arc::new(move |_endpoint, entry: &AuditLogEntry| {
                attempts.fetch_add(1, Ordering::SeqCst);
                if entry.category == "poison" {
                    panic!("forwarder rejected entry");
                }
                delivered.fetch_add(1, Ordering::SeqCst);
            })
        });

        sink.write(&entry("poison")).await.unwrap();
        sink.write(&entry("healthy")).await.unwrap();
        sink.close().await;

        // The poisoned entry is consumed by the crash; the forwarder comes
        // back and still delivers the rest.
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }
}
