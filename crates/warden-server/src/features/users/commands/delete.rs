use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteUserCommand {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteUserResponse {
    pub id: Uuid,
    pub deleted: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteUserError {
    #[error("User {0} not found")]
    NotFound(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<DeleteUserResponse, DeleteUserError>> for DeleteUserCommand {}

impl crate::cqrs::middleware::Command for DeleteUserCommand {
    fn entity_id(&self) -> Option<Uuid> {
        Some(self.id)
    }
}

#[tracing::instrument(skip(pool))]
pub async fn handle(
    pool: PgPool,
    command: DeleteUserCommand,
) -> Result<DeleteUserResponse, DeleteUserError> {
    let deleted = sqlx::query_scalar::<_, Uuid>(
        r#"
        DELETE FROM users
        WHERE id = $1
        RETURNING id
        "#,
    )
    .bind(command.id)
    .fetch_optional(&pool)
    .await?;

    match deleted {
        Some(id) => Ok(DeleteUserResponse { id, deleted: true }),
        None => Err(DeleteUserError::NotFound(command.id)),
    }
}
