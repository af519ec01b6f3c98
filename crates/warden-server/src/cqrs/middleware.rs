//! Audit interception around the mediator
//!
//! [`Dispatcher`] wraps the application mediator and records an
//! [`AuditLogEntry`] for each intercepted request:
//! - Commands are recorded only after successful execution, to every sink
//! - Queries are recorded whether they succeed or fail, but only to sinks
//!   configured to accept read traffic
//! - Requests that implement neither capability pass through untouched
//! - Sink failures are logged and never surface to the caller
//!
//! A request opts into auditing at compile time by implementing [`Command`]
//! or [`Query`]; there is no runtime inspection of request types.

use std::sync::Arc;
use std::time::Instant;

use mediator::{AsyncMediator, Request};
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, warn};
use uuid::Uuid;
use warden_common::json::truncate_depth;

use super::AppMediator;
use crate::api::context::CallerContext;
use crate::audit::{
    derive_log_name, payload_json, AuditLogEntry, AuditSink, RequestKind, SinkMode,
    MAX_RESPONSE_PAYLOAD_DEPTH, TRUNCATED_PLACEHOLDER,
};

/// Marks a state-changing request.
///
/// The serialized request becomes the recorded payload, so the `Serialize`
/// impl should already exclude anything too sensitive to persist.
pub trait Command: Serialize {
    /// Dotted category recorded with the entry. Defaults to the module path
    /// of the request type, e.g. `users.commands.create`.
    fn log_name() -> String {
        derive_log_name(std::any::type_name::<Self>())
    }

    /// Id of the entity this command targets, when it targets exactly one.
    fn entity_id(&self) -> Option<Uuid> {
        None
    }
}

/// Marks a read-only request.
///
/// Query entries never carry an entity id, and only sinks whose mode is
/// [`SinkMode::All`] receive them.
pub trait Query: Serialize {
    /// Record the successful response body alongside the request. Off by
    /// default; response payloads are depth-capped when recorded.
    const LOG_RESPONSE: bool = false;

    /// Dotted category recorded with the entry.
    fn log_name() -> String {
        derive_log_name(std::any::type_name::<Self>())
    }
}

/// Response shape the dispatcher inspects after the handler runs.
///
/// Implemented for every `Result` whose success value serializes. Other
/// response types fall back to the defaults: always successful, nothing to
/// record.
pub trait Outcome {
    /// Whether the handler reported success.
    fn succeeded(&self) -> bool {
        true
    }

    /// Serialized response body, consulted only for queries that opt in via
    /// [`Query::LOG_RESPONSE`].
    fn result_payload(&self) -> Option<JsonValue> {
        None
    }
}

impl<T: Serialize, E> Outcome for Result<T, E> {
    fn succeeded(&self) -> bool {
        self.is_ok()
    }

    fn result_payload(&self) -> Option<JsonValue> {
        self.as_ref().ok().map(|value| payload_json(value))
    }
}

/// The mediator could not produce a response for the request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No handler is registered for the request type, or the handler was
    /// dropped mid-flight.
    #[error("request dispatch failed: {0}")]
    Mediator(#[from] mediator::Error),
}

/// Routes requests through the mediator and fans audit entries out to an
/// immutable sink list.
///
/// The sink list is fixed at construction; the subset eligible for query
/// entries is precomputed there, so per-request dispatch never re-evaluates
/// sink modes.
pub struct Dispatcher {
    mediator: Mutex<AppMediator>,
    sinks: Vec<Arc<dyn AuditSink>>,
    query_sinks: Vec<Arc<dyn AuditSink>>,
}

impl Dispatcher {
    pub fn new(mediator: AppMediator, sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        let query_sinks = sinks
            .iter()
            .filter(|sink| sink.mode() == SinkMode::All)
            .cloned()
            .collect();

        Self {
            mediator: Mutex::new(mediator),
            sinks,
            query_sinks,
        }
    }

    /// Execute a command, recording an entry to every sink on success.
    ///
    /// Failed commands leave no audit trail. The command's own error is part
    /// of the response and is returned untouched; `Err` here means the
    /// request never reached a handler.
    pub async fn send_command<C, R>(
        &self,
        ctx: &CallerContext,
        command: C,
    ) -> Result<R, DispatchError>
    where
        C: Command + Request<R> + Send + 'static,
        R: Outcome + Send + 'static,
    {
        let category = C::log_name();
        let entity_id = command.entity_id();
        let request_payload = payload_json(&command);

        let (response, duration_ms) = self.run_timed(command).await?;

        if !response.succeeded() {
            return Ok(response);
        }

        let entry = AuditLogEntry::builder()
            .category(category)
            .request_kind(RequestKind::Command)
            .request_payload(request_payload)
            .success(true)
            .duration_ms(duration_ms)
            .user_email(ctx.user_email.clone())
            .ip_address(ctx.ip_address.clone())
            .entity_id(entity_id)
            .try_build();

        match entry {
            Ok(entry) => self.fan_out(&self.sinks, &entry).await,
            Err(reason) => error!(reason, "Audit entry construction failed"),
        }

        Ok(response)
    }

    /// Execute a query, recording an entry to the sinks that accept reads.
    ///
    /// With no such sink configured the request goes straight through; the
    /// query is not serialized and no entry is built.
    pub async fn send_query<Q, R>(
        &self,
        ctx: &CallerContext,
        query: Q,
    ) -> Result<R, DispatchError>
    where
        Q: Query + Request<R> + Send + 'static,
        R: Outcome + Send + 'static,
    {
        if self.query_sinks.is_empty() {
            return self.send(query).await;
        }

        let category = Q::log_name();
        let request_payload = payload_json(&query);

        let (response, duration_ms) = self.run_timed(query).await?;

        let response_payload = if Q::LOG_RESPONSE && response.succeeded() {
            response
                .result_payload()
                .map(|payload| {
                    truncate_depth(payload, MAX_RESPONSE_PAYLOAD_DEPTH, TRUNCATED_PLACEHOLDER)
                })
        } else {
            None
        };

        let entry = AuditLogEntry::builder()
            .category(category)
            .request_kind(RequestKind::Query)
            .request_payload(request_payload)
            .response_payload(response_payload)
            .success(response.succeeded())
            .duration_ms(duration_ms)
            .user_email(ctx.user_email.clone())
            .ip_address(ctx.ip_address.clone())
            .try_build();

        match entry {
            Ok(entry) => self.fan_out(&self.query_sinks, &entry).await,
            Err(reason) => error!(reason, "Audit entry construction failed"),
        }

        Ok(response)
    }

    /// Pass a request through with no audit interception.
    pub async fn send<Req, Res>(&self, request: Req) -> Result<Res, DispatchError>
    where
        Req: Request<Res> + Send + 'static,
        Res: Send + 'static,
    {
        let mut mediator = self.mediator.lock().await;
        let response = mediator.send(request).await?;
        Ok(response)
    }

    /// Run a request and measure handler time. The clock starts once the
    /// mediator lock is held; lock wait is not handler time.
    async fn run_timed<Req, Res>(&self, request: Req) -> Result<(Res, i64), DispatchError>
    where
        Req: Request<Res> + Send + 'static,
        Res: Send + 'static,
    {
        let mut mediator = self.mediator.lock().await;
        let started = Instant::now();
        let response = mediator.send(request).await?;
        let duration_ms = started.elapsed().as_millis() as i64;
        Ok((response, duration_ms))
    }

    /// Hand one entry to each sink in turn. A failing sink is logged and
    /// skipped; it cannot affect the response or the other sinks.
    async fn fan_out(&self, sinks: &[Arc<dyn AuditSink>], entry: &AuditLogEntry) {
        for sink in sinks {
            if let Err(e) = sink.write(entry).await {
                warn!(
                    sink = sink.name(),
                    entry_id = %entry.id,
                    error = %e,
                    "Audit sink write failed"
                );
            }
        }
    }
}
