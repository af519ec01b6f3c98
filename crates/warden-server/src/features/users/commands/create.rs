//! Create user command
//!
//! This module implements the command for creating new portal users using
//! the mediator pattern with function-based handlers and inline SQL queries.
//!
//! # Architecture
//!
//! - Command: Pure data structure (no behavior except validation)
//! - Handler: Standalone async function with all business logic and DB operations
//! - SQL queries are inline in the handler for simplicity

use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::features::shared::validation::{
    validate_email, validate_name, EmailValidationError, NameValidationError,
};

/// Command to create a new user
///
/// # Examples
///
/// ```rust,ignore
/// use warden_server::features::users::commands::CreateUserCommand;
///
/// let command = CreateUserCommand {
///     email: "ada@example.com".to_string(),
///     display_name: "Ada Lovelace".to_string(),
///     role_id: None,
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserCommand {
    /// Email address (must be unique)
    pub email: String,

    /// Display name of the user
    pub display_name: String,

    /// Optional role to assign on creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<Uuid>,
}

/// Response from creating a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Errors that can occur when creating a user
#[derive(Debug, thiserror::Error)]
pub enum CreateUserError {
    #[error("Email validation failed: {0}")]
    EmailValidation(#[from] EmailValidationError),

    #[error("Name validation failed: {0}")]
    NameValidation(#[from] NameValidationError),

    #[error("User with email '{0}' already exists")]
    DuplicateEmail(String),

    #[error("Role {0} does not exist")]
    RoleNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

// Implement mediator Request trait for the command
impl Request<Result<CreateUserResponse, CreateUserError>> for CreateUserCommand {}

// Mark as Command for the audit dispatcher
impl crate::cqrs::middleware::Command for CreateUserCommand {}

impl CreateUserCommand {
    /// Validates the command parameters
    ///
    /// # Errors
    ///
    /// Returns a validation error if any field fails validation:
    /// - Email must be 1-320 characters and shaped like local@domain
    /// - Display name must be 1-256 characters
    #[tracing::instrument(skip(self), fields(email = %self.email))]
    pub fn validate(&self) -> Result<(), CreateUserError> {
        // Validate email using shared utility
        validate_email(&self.email, 320)?;

        // Validate display name using shared utility
        validate_name(&self.display_name, 256)?;

        tracing::debug!("Command validation passed");
        Ok(())
    }
}

/// Handler function for creating users
///
/// This is a standalone async function that contains all business logic
/// and database operations.
///
/// # Arguments
///
/// * `pool` - Database connection pool
/// * `command` - The create user command
///
/// # Returns
///
/// Returns the created user details or an error
///
/// # Errors
///
/// - Validation errors if command parameters are invalid
/// - Duplicate error if a user with the same email exists
/// - Role error if the referenced role does not exist
/// - Database errors if the operation fails
#[tracing::instrument(
    skip(pool, command),
    fields(
        email = %command.email,
        role_id = ?command.role_id
    )
)]
pub async fn handle(
    pool: PgPool,
    command: CreateUserCommand,
) -> Result<CreateUserResponse, CreateUserError> {
    // Validate command
    command.validate()?;

    tracing::info!("Creating user");

    let result = sqlx::query_as::<_, UserRecord>(
        r#"
        INSERT INTO users (email, display_name, role_id)
        VALUES ($1, $2, $3)
        RETURNING id, email, display_name, role_id, active, created_at
        "#,
    )
    .bind(&command.email)
    .bind(&command.display_name)
    .bind(command.role_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        // Check for unique and foreign key constraint violations
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return CreateUserError::DuplicateEmail(command.email.clone());
            }
            if db_err.is_foreign_key_violation() {
                if let Some(role_id) = command.role_id {
                    return CreateUserError::RoleNotFound(role_id);
                }
            }
        }
        CreateUserError::Database(e)
    })?;

    tracing::info!(
        user_id = %result.id,
        user_email = %result.email,
        "User created successfully"
    );

    // Convert database record to response
    Ok(CreateUserResponse {
        id: result.id,
        email: result.email,
        display_name: result.display_name,
        role_id: result.role_id,
        active: result.active,
        created_at: result.created_at,
    })
}

// Database record structure for the insert query
#[derive(Debug, sqlx::FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    display_name: String,
    role_id: Option<Uuid>,
    active: bool,
    created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cqrs::middleware::Command;

    #[test]
    fn test_validation_success() {
        let cmd = CreateUserCommand {
            email: "ada@example.com".to_string(),
            display_name: "Ada Lovelace".to_string(),
            role_id: None,
        };
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_validation_empty_email() {
        let cmd = CreateUserCommand {
            email: "".to_string(),
            display_name: "Ada Lovelace".to_string(),
            role_id: None,
        };
        assert!(matches!(
            cmd.validate(),
            Err(CreateUserError::EmailValidation(_))
        ));
    }

    #[test]
    fn test_validation_invalid_email_format() {
        let invalid_emails = vec!["no-at-sign", "@example.com", "user@", "user@nodot"];

        for email in invalid_emails {
            let cmd = CreateUserCommand {
                email: email.to_string(),
                display_name: "Test".to_string(),
                role_id: None,
            };
            assert!(
                matches!(cmd.validate(), Err(CreateUserError::EmailValidation(_))),
                "Email '{}' should be invalid",
                email
            );
        }
    }

    #[test]
    fn test_validation_email_too_long() {
        let cmd = CreateUserCommand {
            email: format!("{}@example.com", "a".repeat(320)),
            display_name: "Test".to_string(),
            role_id: None,
        };
        assert!(matches!(
            cmd.validate(),
            Err(CreateUserError::EmailValidation(_))
        ));
    }

    #[test]
    fn test_validation_empty_display_name() {
        let cmd = CreateUserCommand {
            email: "ada@example.com".to_string(),
            display_name: "   ".to_string(),
            role_id: None,
        };
        assert!(matches!(
            cmd.validate(),
            Err(CreateUserError::NameValidation(_))
        ));
    }

    #[test]
    fn test_validation_display_name_too_long() {
        let cmd = CreateUserCommand {
            email: "ada@example.com".to_string(),
            display_name: "a".repeat(257),
            role_id: None,
        };
        assert!(matches!(
            cmd.validate(),
            Err(CreateUserError::NameValidation(_))
        ));
    }

    #[test]
    fn test_audit_category_derived_from_module_path() {
        assert_eq!(CreateUserCommand::log_name(), "users.commands.create");
    }

    #[test]
    fn test_audit_entity_id_absent_before_insert() {
        let cmd = CreateUserCommand {
            email: "ada@example.com".to_string(),
            display_name: "Ada Lovelace".to_string(),
            role_id: None,
        };
        assert_eq!(cmd.entity_id(), None);
    }
}
