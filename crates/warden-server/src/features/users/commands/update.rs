//! Update user command
//!
//! Partially updates an existing user. Only the fields that are provided
//! will be updated; others remain unchanged.

use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::features::shared::validation::is_valid_email;

/// Command to update an existing user
///
/// At least one field besides `id` must be provided for update. The `id`
/// identifies which user to update and cannot itself be changed.
///
/// # Examples
///
/// ```rust,ignore
/// use warden_server::features::users::commands::UpdateUserCommand;
///
/// let command = UpdateUserCommand {
///     id: user_id,
///     email: None,  // Keep existing email
///     display_name: Some("Ada King".to_string()),
///     role_id: None,
///     active: Some(false),
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserCommand {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// Response from updating a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<Uuid>,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Errors that can occur when updating a user
#[derive(Debug, thiserror::Error)]
pub enum UpdateUserError {
    /// No fields were provided for update
    #[error("At least one field must be provided for update")]
    NoFieldsToUpdate,
    /// Email failed validation
    #[error("Email '{0}' is invalid")]
    EmailInvalid(String),
    /// Display name was empty or only whitespace
    #[error("Display name cannot be empty or only whitespace")]
    NameEmpty,
    /// Display name exceeds maximum length
    #[error("Display name must be between 1 and 256 characters")]
    NameLength,
    /// Another user already holds the requested email
    #[error("User with email '{0}' already exists")]
    DuplicateEmail(String),
    /// The requested role does not exist
    #[error("Role {0} does not exist")]
    RoleNotFound(Uuid),
    /// User with the given id was not found
    #[error("User {0} not found")]
    NotFound(Uuid),
    /// A database error occurred
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<UpdateUserResponse, UpdateUserError>> for UpdateUserCommand {}

impl crate::cqrs::middleware::Command for UpdateUserCommand {
    fn entity_id(&self) -> Option<Uuid> {
        Some(self.id)
    }
}

impl UpdateUserCommand {
    /// Validates the command parameters
    ///
    /// # Errors
    ///
    /// - `NoFieldsToUpdate` - No fields provided for update
    /// - `EmailInvalid` - Email is empty, too long, or malformed
    /// - `NameEmpty` - Display name is empty or whitespace-only
    /// - `NameLength` - Display name exceeds 256 characters
    pub fn validate(&self) -> Result<(), UpdateUserError> {
        if self.email.is_none()
            && self.display_name.is_none()
            && self.role_id.is_none()
            && self.active.is_none()
        {
            return Err(UpdateUserError::NoFieldsToUpdate);
        }
        if let Some(ref email) = self.email {
            if email.is_empty() || email.len() > 320 || !is_valid_email(email) {
                return Err(UpdateUserError::EmailInvalid(email.clone()));
            }
        }
        if let Some(ref display_name) = self.display_name {
            if display_name.trim().is_empty() {
                return Err(UpdateUserError::NameEmpty);
            }
            if display_name.len() > 256 {
                return Err(UpdateUserError::NameLength);
            }
        }
        Ok(())
    }
}

/// Handles the update user command
///
/// Updates an existing user with the provided fields. Fields that are
/// `None` are not changed (existing values are preserved).
///
/// # Arguments
///
/// * `pool` - Database connection pool
/// * `command` - The update command with fields to modify
///
/// # Returns
///
/// Returns the updated user details on success.
///
/// # Errors
///
/// - Validation errors if command parameters are invalid
/// - `NotFound` - No user with the given id exists
/// - `DuplicateEmail` - The new email is already taken
/// - `RoleNotFound` - The new role does not exist
/// - `Database` - A database error occurred
#[tracing::instrument(skip(pool))]
pub async fn handle(
    pool: PgPool,
    command: UpdateUserCommand,
) -> Result<UpdateUserResponse, UpdateUserError> {
    command.validate()?;

    let user = sqlx::query_as::<_, UserRecord>(
        r#"
        SELECT id, email, display_name, role_id, active, created_at, updated_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(command.id)
    .fetch_optional(&pool)
    .await?
    .ok_or(UpdateUserError::NotFound(command.id))?;

    let new_email = command.email.as_ref().unwrap_or(&user.email);
    let new_display_name = command.display_name.as_ref().unwrap_or(&user.display_name);
    let new_role_id = command.role_id.or(user.role_id);
    let new_active = command.active.unwrap_or(user.active);

    let result = sqlx::query_as::<_, UserRecord>(
        r#"
        UPDATE users
        SET email = $2, display_name = $3, role_id = $4, active = $5, updated_at = NOW()
        WHERE id = $1
        RETURNING id, email, display_name, role_id, active, created_at, updated_at
        "#,
    )
    .bind(command.id)
    .bind(new_email)
    .bind(new_display_name)
    .bind(new_role_id)
    .bind(new_active)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return UpdateUserError::DuplicateEmail(new_email.clone());
            }
            if db_err.is_foreign_key_violation() {
                if let Some(role_id) = new_role_id {
                    return UpdateUserError::RoleNotFound(role_id);
                }
            }
        }
        UpdateUserError::Database(e)
    })?;

    Ok(UpdateUserResponse {
        id: result.id,
        email: result.email,
        display_name: result.display_name,
        role_id: result.role_id,
        active: result.active,
        updated_at: result.updated_at,
    })
}

#[derive(Debug, sqlx::FromRow)]
#[allow(dead_code)]
struct UserRecord {
    id: Uuid,
    email: String,
    display_name: String,
    role_id: Option<Uuid>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cqrs::middleware::Command;

    #[test]
    fn test_validation_success() {
        let cmd = UpdateUserCommand {
            id: Uuid::new_v4(),
            email: None,
            display_name: Some("Updated Name".to_string()),
            role_id: None,
            active: Some(false),
        };
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_validation_no_fields() {
        let cmd = UpdateUserCommand {
            id: Uuid::new_v4(),
            email: None,
            display_name: None,
            role_id: None,
            active: None,
        };
        assert!(matches!(cmd.validate(), Err(UpdateUserError::NoFieldsToUpdate)));
    }

    #[test]
    fn test_validation_invalid_email() {
        let cmd = UpdateUserCommand {
            id: Uuid::new_v4(),
            email: Some("not-an-email".to_string()),
            display_name: None,
            role_id: None,
            active: None,
        };
        assert!(matches!(cmd.validate(), Err(UpdateUserError::EmailInvalid(_))));
    }

    #[test]
    fn test_validation_empty_display_name() {
        let cmd = UpdateUserCommand {
            id: Uuid::new_v4(),
            email: None,
            display_name: Some("   ".to_string()),
            role_id: None,
            active: None,
        };
        assert!(matches!(cmd.validate(), Err(UpdateUserError::NameEmpty)));
    }

    #[test]
    fn test_audit_entity_id_targets_user() {
        let id = Uuid::new_v4();
        let cmd = UpdateUserCommand {
            id,
            email: None,
            display_name: Some("Name".to_string()),
            role_id: None,
            active: None,
        };
        assert_eq!(cmd.entity_id(), Some(id));
    }
}
