use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetUserQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetUserResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum GetUserError {
    #[error("Either id or email is required")]
    IdOrEmailRequired,
    #[error("User not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<GetUserResponse, GetUserError>> for GetUserQuery {}

impl crate::cqrs::middleware::Query for GetUserQuery {
    // Single-entity lookups record their response payload in the audit trail
    const LOG_RESPONSE: bool = true;
}

impl GetUserQuery {
    pub fn validate(&self) -> Result<(), GetUserError> {
        if self.id.is_none() && self.email.is_none() {
            return Err(GetUserError::IdOrEmailRequired);
        }
        Ok(())
    }
}

#[tracing::instrument(skip(pool))]
pub async fn handle(pool: PgPool, query: GetUserQuery) -> Result<GetUserResponse, GetUserError> {
    query.validate()?;

    let result = if let Some(id) = query.id {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT u.id, u.email, u.display_name, u.role_id, r.name AS role_name,
                   u.active, u.created_at, u.updated_at
            FROM users u
            LEFT JOIN roles r ON r.id = u.role_id
            WHERE u.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&pool)
        .await?
    } else if let Some(email) = query.email {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT u.id, u.email, u.display_name, u.role_id, r.name AS role_name,
                   u.active, u.created_at, u.updated_at
            FROM users u
            LEFT JOIN roles r ON r.id = u.role_id
            WHERE LOWER(u.email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&pool)
        .await?
    } else {
        None
    };

    let user = result.ok_or(GetUserError::NotFound)?;

    Ok(GetUserResponse {
        id: user.id,
        email: user.email,
        display_name: user.display_name,
        role_id: user.role_id,
        role_name: user.role_name,
        active: user.active,
        created_at: user.created_at,
        updated_at: user.updated_at,
    })
}

#[derive(Debug, sqlx::FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    display_name: String,
    role_id: Option<Uuid>,
    role_name: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
