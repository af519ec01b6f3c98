//! Database queries for the audit trail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::entry::{AuditLogEntry, RequestKind};
use crate::error::ServerResult;

// ============================================================================
// Audit Query Constants
// ============================================================================

/// Default number of audit entries returned per query
pub const DEFAULT_AUDIT_QUERY_LIMIT: i64 = 100;

/// Maximum number of audit entries that can be returned in a single query.
/// This prevents excessive memory usage and query timeouts.
pub const MAX_AUDIT_QUERY_LIMIT: i64 = 1000;

/// Audit log entry as read back from the database
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLogRecord {
    pub id: Uuid,
    pub category: String,
    pub request_kind: String,
    pub request_payload: JsonValue,
    pub response_payload: Option<JsonValue>,
    pub success: bool,
    pub duration_ms: i64,
    pub user_email: Option<String>,
    pub ip_address: Option<String>,
    pub entity_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

/// Query parameters for listing audit entries
#[derive(Debug, Clone, Deserialize)]
pub struct AuditLogQuery {
    /// Filter by exact category, e.g. `users.commands.create`
    pub category: Option<String>,
    /// Filter by request kind
    pub request_kind: Option<RequestKind>,
    /// Filter by handler outcome
    pub success: Option<bool>,
    /// Filter by caller email
    pub user_email: Option<String>,
    /// Filter by target entity
    pub entity_id: Option<Uuid>,
    /// Start timestamp for range query
    pub start_time: Option<DateTime<Utc>>,
    /// End timestamp for range query
    pub end_time: Option<DateTime<Utc>>,
    /// Maximum number of results to return
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Offset for pagination
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_AUDIT_QUERY_LIMIT
}

fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_AUDIT_QUERY_LIMIT)
}

impl Default for AuditLogQuery {
    fn default() -> Self {
        Self {
            category: None,
            request_kind: None,
            success: None,
            user_email: None,
            entity_id: None,
            start_time: None,
            end_time: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// Persist one audit entry.
///
/// The entry id and timestamp were assigned when the entry was built, so
/// the row matches what the other sinks observed. Returns the raw driver
/// error; the database sink maps it into its own error type.
pub async fn insert_entry(pool: &PgPool, entry: &AuditLogEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO audit_log (
            id, category, request_kind, request_payload, response_payload,
            success, duration_ms, user_email, ip_address, entity_id, timestamp
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(entry.id)
    .bind(&entry.category)
    .bind(entry.request_kind.as_str())
    .bind(&entry.request_payload)
    .bind(&entry.response_payload)
    .bind(entry.success)
    .bind(entry.duration_ms)
    .bind(&entry.user_email)
    .bind(&entry.ip_address)
    .bind(entry.entity_id)
    .bind(entry.timestamp)
    .execute(pool)
    .await?;

    debug!(
        audit_id = %entry.id,
        category = %entry.category,
        kind = %entry.request_kind,
        "Persisted audit log entry"
    );

    Ok(())
}

/// Query audit logs with filters
///
/// Builds a dynamic query from the provided filters and returns matching
/// entries, newest first.
pub async fn query_audit_logs(
    pool: &PgPool,
    query: AuditLogQuery,
) -> ServerResult<Vec<AuditLogRecord>> {
    let limit = clamp_limit(query.limit);

    let mut sql = String::from(
        r#"
        SELECT
            id, category, request_kind, request_payload, response_payload,
            success, duration_ms, user_email, ip_address, entity_id, timestamp
        FROM audit_log
        WHERE 1=1
        "#,
    );

    let mut bind_count = 1;
    let mut conditions = Vec::new();

    // Build dynamic query based on filters
    if query.category.is_some() {
        conditions.push(format!("category = ${}", bind_count));
        bind_count += 1;
    }
    if query.request_kind.is_some() {
        conditions.push(format!("request_kind = ${}", bind_count));
        bind_count += 1;
    }
    if query.success.is_some() {
        conditions.push(format!("success = ${}", bind_count));
        bind_count += 1;
    }
    if query.user_email.is_some() {
        conditions.push(format!("user_email = ${}", bind_count));
        bind_count += 1;
    }
    if query.entity_id.is_some() {
        conditions.push(format!("entity_id = ${}", bind_count));
        bind_count += 1;
    }
    if query.start_time.is_some() {
        conditions.push(format!("timestamp >= ${}", bind_count));
        bind_count += 1;
    }
    if query.end_time.is_some() {
        conditions.push(format!("timestamp <= ${}", bind_count));
        bind_count += 1;
    }

    for condition in conditions {
        sql.push_str(" AND ");
        sql.push_str(&condition);
    }

    sql.push_str(" ORDER BY timestamp DESC");
    sql.push_str(&format!(" LIMIT ${}", bind_count));
    bind_count += 1;
    sql.push_str(&format!(" OFFSET ${}", bind_count));

    let mut query_builder = sqlx::query_as::<_, AuditLogRecord>(&sql);

    // Bind parameters in order
    if let Some(category) = query.category {
        query_builder = query_builder.bind(category);
    }
    if let Some(request_kind) = query.request_kind {
        query_builder = query_builder.bind(request_kind.as_str());
    }
    if let Some(success) = query.success {
        query_builder = query_builder.bind(success);
    }
    if let Some(user_email) = query.user_email {
        query_builder = query_builder.bind(user_email);
    }
    if let Some(entity_id) = query.entity_id {
        query_builder = query_builder.bind(entity_id);
    }
    if let Some(start_time) = query.start_time {
        query_builder = query_builder.bind(start_time);
    }
    if let Some(end_time) = query.end_time {
        query_builder = query_builder.bind(end_time);
    }

    query_builder = query_builder.bind(limit).bind(query.offset);

    let records = query_builder.fetch_all(pool).await?;

    debug!(count = records.len(), "Queried audit logs");

    Ok(records)
}
