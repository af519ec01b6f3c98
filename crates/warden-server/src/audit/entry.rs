//! Audit data model
//!
//! One [`AuditLogEntry`] is produced per intercepted request and handed to
//! every eligible sink. Entries are immutable once built; sinks only read
//! them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// ============================================================================
// Payload Constants
// ============================================================================

/// Placeholder recorded when a request or response cannot be serialized.
pub const UNSERIALIZABLE_PLACEHOLDER: &str = "<unserializable>";

/// Placeholder substituted for JSON subtrees beyond the depth cap.
pub const TRUNCATED_PLACEHOLDER: &str = "<truncated>";

/// Maximum nesting depth kept when a query opts into response logging.
pub const MAX_RESPONSE_PAYLOAD_DEPTH: usize = 10;

/// Whether an entry was produced by a state-changing command or a read-only
/// query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Command,
    Query,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Query => "query",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single audit record, shared by all sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Unique identifier, generated when the entry is built
    pub id: Uuid,
    /// Dotted category derived from the request type path
    pub category: String,
    /// Command or query
    pub request_kind: RequestKind,
    /// Serialized request, or a placeholder when serialization failed
    pub request_payload: JsonValue,
    /// Serialized response; only present for queries that opt in
    pub response_payload: Option<JsonValue>,
    /// Whether the handler reported success
    pub success: bool,
    /// Handler execution time in milliseconds
    pub duration_ms: i64,
    /// Email of the caller, when authenticated
    pub user_email: Option<String>,
    /// Client IP address
    pub ip_address: Option<String>,
    /// Id of the entity a command targeted, when the command names one
    pub entity_id: Option<Uuid>,
    /// When the entry was built
    pub timestamp: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Create a builder for constructing audit entries
    pub fn builder() -> AuditLogEntryBuilder {
        AuditLogEntryBuilder::default()
    }
}

/// Builder for audit entries
///
/// `id` and `timestamp` are assigned at build time so that every sink sees
/// the same values for the same entry.
#[derive(Debug, Clone, Default)]
pub struct AuditLogEntryBuilder {
    category: Option<String>,
    request_kind: Option<RequestKind>,
    request_payload: Option<JsonValue>,
    response_payload: Option<JsonValue>,
    success: Option<bool>,
    duration_ms: Option<i64>,
    user_email: Option<String>,
    ip_address: Option<String>,
    entity_id: Option<Uuid>,
}

impl AuditLogEntryBuilder {
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn request_kind(mut self, kind: RequestKind) -> Self {
        self.request_kind = Some(kind);
        self
    }

    pub fn request_payload(mut self, payload: JsonValue) -> Self {
        self.request_payload = Some(payload);
        self
    }

    pub fn response_payload(mut self, payload: Option<JsonValue>) -> Self {
        self.response_payload = payload;
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    pub fn duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn user_email(mut self, user_email: Option<String>) -> Self {
        self.user_email = user_email;
        self
    }

    pub fn ip_address(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    pub fn entity_id(mut self, entity_id: Option<Uuid>) -> Self {
        self.entity_id = entity_id;
        self
    }

    /// Build the entry
    ///
    /// # Panics
    /// Panics if a required field is missing. Use `try_build()` for fallible
    /// construction.
    pub fn build(self) -> AuditLogEntry {
        self.try_build()
            .expect("AuditLogEntryBuilder: category, request_kind, request_payload, success and duration_ms are required")
    }

    /// Try to build the entry, returning an error if required fields are missing
    pub fn try_build(self) -> Result<AuditLogEntry, &'static str> {
        let category = self.category.ok_or("category is required")?;
        let request_kind = self.request_kind.ok_or("request_kind is required")?;
        let request_payload = self.request_payload.ok_or("request_payload is required")?;
        let success = self.success.ok_or("success is required")?;
        let duration_ms = self.duration_ms.ok_or("duration_ms is required")?;

        Ok(AuditLogEntry {
            id: Uuid::new_v4(),
            category,
            request_kind,
            request_payload,
            response_payload: self.response_payload,
            success,
            duration_ms,
            user_email: self.user_email,
            ip_address: self.ip_address,
            entity_id: self.entity_id,
            timestamp: Utc::now(),
        })
    }
}

/// Serialize a request or response for the audit trail.
///
/// Serialization failures never surface to the caller; the payload is
/// replaced with [`UNSERIALIZABLE_PLACEHOLDER`] and a warning is logged.
pub fn payload_json<T: serde::Serialize>(value: &T) -> JsonValue {
    match serde_json::to_value(value) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(
                payload_type = std::any::type_name::<T>(),
                error = %e,
                "Audit payload serialization failed, recording placeholder"
            );
            JsonValue::String(UNSERIALIZABLE_PLACEHOLDER.to_string())
        },
    }
}

/// Derive a dotted category from a fully qualified type path.
///
/// Everything up to and including the `features::` segment is stripped, the
/// type name itself is dropped, and the remaining module path is joined with
/// dots: `warden_server::features::users::commands::create::CreateUserCommand`
/// becomes `users.commands.create`. Types outside a `features` tree keep
/// their full module path.
pub fn derive_log_name(type_path: &str) -> String {
    const MARKER: &str = "features::";

    let trimmed = match type_path.find(MARKER) {
        Some(idx) => &type_path[idx + MARKER.len()..],
        None => type_path,
    };

    let mut segments: Vec<&str> = trimmed.split("::").collect();
    if segments.len() > 1 {
        segments.pop();
    }
    segments.join(".")
}
