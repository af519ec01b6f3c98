use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::features::shared::pagination::{PaginationMetadata, PaginationParams};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListUsersQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_contains: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListItem {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub items: Vec<UserListItem>,
    pub pagination: PaginationMetadata,
}

#[derive(Debug, thiserror::Error)]
pub enum ListUsersError {
    #[error("Page must be greater than 0")]
    InvalidPage,
    #[error("Per page must be between 1 and 100")]
    InvalidPerPage,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<ListUsersResponse, ListUsersError>> for ListUsersQuery {}

impl crate::cqrs::middleware::Query for ListUsersQuery {}

impl ListUsersQuery {
    pub fn validate(&self) -> Result<(), ListUsersError> {
        if let Some(page) = self.page {
            if page < 1 {
                return Err(ListUsersError::InvalidPage);
            }
        }
        if let Some(per_page) = self.per_page {
            if per_page < 1 || per_page > 100 {
                return Err(ListUsersError::InvalidPerPage);
            }
        }
        Ok(())
    }
}

#[tracing::instrument(skip(pool))]
pub async fn handle(
    pool: PgPool,
    query: ListUsersQuery,
) -> Result<ListUsersResponse, ListUsersError> {
    query.validate()?;

    let params = PaginationParams::new(query.page, query.per_page);
    let email_pattern = query
        .email_contains
        .as_ref()
        .map(|s| format!("%{}%", s.to_lowercase()));

    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM users
        WHERE ($1::BOOLEAN IS NULL OR active = $1)
          AND ($2::UUID IS NULL OR role_id = $2)
          AND ($3::TEXT IS NULL OR LOWER(email) LIKE $3)
        "#,
    )
    .bind(query.active)
    .bind(query.role_id)
    .bind(email_pattern.as_deref())
    .fetch_one(&pool)
    .await?;

    let records = sqlx::query_as::<_, UserRecord>(
        r#"
        SELECT id, email, display_name, role_id, active, created_at
        FROM users
        WHERE ($1::BOOLEAN IS NULL OR active = $1)
          AND ($2::UUID IS NULL OR role_id = $2)
          AND ($3::TEXT IS NULL OR LOWER(email) LIKE $3)
        ORDER BY created_at DESC
        LIMIT $4
        OFFSET $5
        "#,
    )
    .bind(query.active)
    .bind(query.role_id)
    .bind(email_pattern.as_deref())
    .bind(params.per_page())
    .bind(params.offset())
    .fetch_all(&pool)
    .await?;

    let items = records
        .into_iter()
        .map(|r| UserListItem {
            id: r.id,
            email: r.email,
            display_name: r.display_name,
            role_id: r.role_id,
            active: r.active,
            created_at: r.created_at,
        })
        .collect();

    Ok(ListUsersResponse {
        items,
        pagination: PaginationMetadata::from_params(&params, total),
    })
}

#[derive(Debug, sqlx::FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    display_name: String,
    role_id: Option<Uuid>,
    active: bool,
    created_at: DateTime<Utc>,
}
