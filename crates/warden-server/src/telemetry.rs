//! OpenTelemetry tracer wiring
//!
//! Optional alternative to the plain logging setup in `warden_common`. When
//! enabled, spans are exported through a simple stdout exporter and the
//! current trace/span ids become available to the trace audit sink for
//! correlation.

use opentelemetry::trace::{TraceContextExt, TracerProvider as _};
use opentelemetry_sdk::trace::TracerProvider;
use thiserror::Error;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use tracing_subscriber::{
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

use crate::config::TelemetryConfig;

/// Errors raised while installing the tracer.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to set global subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Owns the tracer provider for the lifetime of the process.
///
/// Dropping the guard flushes and shuts down the exporter pipeline.
pub struct TelemetryGuard {
    provider: Option<TracerProvider>,
}

impl TelemetryGuard {
    /// Shut down the tracer provider, flushing any pending spans.
    pub fn shutdown(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = %e, "Tracer provider shutdown failed");
            }
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Install the global subscriber with an OpenTelemetry layer attached.
///
/// Call once at startup, instead of `warden_common::logging::init_logging`.
/// The returned guard must be held until shutdown.
pub fn init_tracing(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let provider = TracerProvider::builder()
        .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        .build();
    let tracer = provider.tracer(config.service_name.clone());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer();
    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(TelemetryGuard {
        provider: Some(provider),
    })
}

/// Trace id of the current span, when one is active and sampled.
pub fn current_trace_id() -> Option<String> {
    let context = tracing::Span::current().context();
    let span = context.span();
    let span_context = span.span_context();
    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

/// Span id of the current span, when one is active and sampled.
pub fn current_span_id() -> Option<String> {
    let context = tracing::Span::current().context();
    let span = context.span();
    let span_context = span.span_context();
    if span_context.is_valid() {
        Some(span_context.span_id().to_string())
    } else {
        None
    }
}
