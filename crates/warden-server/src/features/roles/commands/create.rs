//! Create role command
//!
//! Roles are reference data; creating one is rare and always audited.

use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::features::shared::validation::{validate_name, NameValidationError};

/// Command to create a new role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoleCommand {
    /// Role name (must be unique)
    pub name: String,

    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Response from creating a role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoleResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Errors that can occur when creating a role
#[derive(Debug, thiserror::Error)]
pub enum CreateRoleError {
    #[error("Name validation failed: {0}")]
    NameValidation(#[from] NameValidationError),

    #[error("Role with name '{0}' already exists")]
    DuplicateName(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<CreateRoleResponse, CreateRoleError>> for CreateRoleCommand {}

impl crate::cqrs::middleware::Command for CreateRoleCommand {}

impl CreateRoleCommand {
    /// Validates the command parameters
    #[tracing::instrument(skip(self), fields(name = %self.name))]
    pub fn validate(&self) -> Result<(), CreateRoleError> {
        validate_name(&self.name, 256)?;
        Ok(())
    }
}

/// Handler function for creating roles
#[tracing::instrument(skip(pool, command), fields(name = %command.name))]
pub async fn handle(
    pool: PgPool,
    command: CreateRoleCommand,
) -> Result<CreateRoleResponse, CreateRoleError> {
    command.validate()?;

    tracing::info!("Creating role");

    let result = sqlx::query_as::<_, RoleRecord>(
        r#"
        INSERT INTO roles (name, description)
        VALUES ($1, $2)
        RETURNING id, name, description, created_at
        "#,
    )
    .bind(&command.name)
    .bind(&command.description)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return CreateRoleError::DuplicateName(command.name.clone());
            }
        }
        CreateRoleError::Database(e)
    })?;

    tracing::info!(role_id = %result.id, role_name = %result.name, "Role created successfully");

    Ok(CreateRoleResponse {
        id: result.id,
        name: result.name,
        description: result.description,
        created_at: result.created_at,
    })
}

#[derive(Debug, sqlx::FromRow)]
struct RoleRecord {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cqrs::middleware::Command;

    #[test]
    fn test_validation_success() {
        let cmd = CreateRoleCommand {
            name: "auditor".to_string(),
            description: Some("Read-only audit access".to_string()),
        };
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_validation_empty_name() {
        let cmd = CreateRoleCommand {
            name: "   ".to_string(),
            description: None,
        };
        assert!(matches!(
            cmd.validate(),
            Err(CreateRoleError::NameValidation(_))
        ));
    }

    #[test]
    fn test_validation_name_too_long() {
        let cmd = CreateRoleCommand {
            name: "a".repeat(257),
            description: None,
        };
        assert!(matches!(
            cmd.validate(),
            Err(CreateRoleError::NameValidation(_))
        ));
    }

    #[test]
    fn test_audit_category_derived_from_module_path() {
        assert_eq!(CreateRoleCommand::log_name(), "roles.commands.create");
    }
}
