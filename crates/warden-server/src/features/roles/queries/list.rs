use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRolesQuery {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleListItem {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub user_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRolesResponse {
    pub items: Vec<RoleListItem>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListRolesError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

// Not marked as an audited Query: role listings are reference-data reads
// and stay out of the audit trail.
impl Request<Result<ListRolesResponse, ListRolesError>> for ListRolesQuery {}

#[tracing::instrument(skip(pool))]
pub async fn handle(
    pool: PgPool,
    _query: ListRolesQuery,
) -> Result<ListRolesResponse, ListRolesError> {
    let records = sqlx::query_as::<_, RoleRecord>(
        r#"
        SELECT r.id, r.name, r.description, r.created_at, COUNT(u.id) AS user_count
        FROM roles r
        LEFT JOIN users u ON u.role_id = r.id
        GROUP BY r.id, r.name, r.description, r.created_at
        ORDER BY r.name
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let items = records
        .into_iter()
        .map(|r| RoleListItem {
            id: r.id,
            name: r.name,
            description: r.description,
            user_count: r.user_count,
            created_at: r.created_at,
        })
        .collect();

    Ok(ListRolesResponse { items })
}

#[derive(Debug, sqlx::FromRow)]
struct RoleRecord {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    user_count: i64,
}
