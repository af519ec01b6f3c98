//! Role API routes
//!
//! # Route Structure
//!
//! - `POST /api/v1/roles` - Create a new role (audited)
//! - `GET /api/v1/roles` - List roles with user counts (not audited)

use crate::api::context::CallerContext;
use crate::api::response::{ApiResponse, ErrorResponse};
use crate::cqrs::middleware::DispatchError;
use crate::features::FeatureState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use super::{
    commands::{CreateRoleCommand, CreateRoleError},
    queries::ListRolesQuery,
};

// ============================================================================
// Router Configuration
// ============================================================================

/// Creates the roles router with all routes configured
pub fn roles_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", post(create_role))
        .route("/", get(list_roles))
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

/// Create a new role
///
/// # Endpoint
///
/// `POST /api/v1/roles`
///
/// # Response
///
/// - `201 Created` - Role created successfully
/// - `400 Bad Request` - Validation error
/// - `409 Conflict` - Role with name already exists
/// - `500 Internal Server Error` - Database error
#[tracing::instrument(
    skip(state, ctx, command),
    fields(name = %command.name)
)]
async fn create_role(
    State(state): State<FeatureState>,
    ctx: CallerContext,
    Json(command): Json<CreateRoleCommand>,
) -> Result<Response, RoleApiError> {
    let response = state.dispatcher.send_command(&ctx, command).await??;

    tracing::info!(
        role_id = %response.id,
        role_name = %response.name,
        "Role created via API"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))).into_response())
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

/// List all roles with their user counts
///
/// # Endpoint
///
/// `GET /api/v1/roles`
///
/// # Response
///
/// - `200 OK` - List of roles
/// - `500 Internal Server Error` - Database error
#[tracing::instrument(skip(state))]
async fn list_roles(State(state): State<FeatureState>) -> Result<Response, RoleApiError> {
    // Plain dispatch: this read does not go through the audit path
    let response = state.dispatcher.send(ListRolesQuery {}).await??;

    tracing::debug!(count = response.items.len(), "Roles listed via API");

    Ok((StatusCode::OK, Json(ApiResponse::success(response.items))).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Unified error type for role API endpoints
#[derive(Debug)]
enum RoleApiError {
    CreateError(CreateRoleError),
    ListError(super::queries::ListRolesError),
    DispatchError(DispatchError),
}

impl From<CreateRoleError> for RoleApiError {
    fn from(err: CreateRoleError) -> Self {
        Self::CreateError(err)
    }
}

impl From<super::queries::ListRolesError> for RoleApiError {
    fn from(err: super::queries::ListRolesError) -> Self {
        Self::ListError(err)
    }
}

impl From<DispatchError> for RoleApiError {
    fn from(err: DispatchError) -> Self {
        Self::DispatchError(err)
    }
}

impl IntoResponse for RoleApiError {
    fn into_response(self) -> Response {
        match self {
            // Create errors
            RoleApiError::CreateError(CreateRoleError::NameValidation(_)) => {
                let error = ErrorResponse::new("VALIDATION_ERROR", self.to_string());
                (StatusCode::BAD_REQUEST, Json(error)).into_response()
            },
            RoleApiError::CreateError(CreateRoleError::DuplicateName(name)) => {
                let error = ErrorResponse::new(
                    "CONFLICT",
                    format!("Role with name '{}' already exists", name),
                );
                (StatusCode::CONFLICT, Json(error)).into_response()
            },
            RoleApiError::CreateError(CreateRoleError::Database(_)) => {
                tracing::error!("Database error during role creation: {}", self);
                let error = ErrorResponse::new("INTERNAL_ERROR", "A database error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            },

            // List errors
            RoleApiError::ListError(super::queries::ListRolesError::Database(_)) => {
                tracing::error!("Database error during roles listing: {}", self);
                let error = ErrorResponse::new("INTERNAL_ERROR", "A database error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            },

            // Dispatch errors
            RoleApiError::DispatchError(_) => {
                tracing::error!("Mediator dispatch failed: {}", self);
                let error = ErrorResponse::new("INTERNAL_ERROR", "An internal error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            },
        }
    }
}

impl std::fmt::Display for RoleApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateError(e) => write!(f, "{}", e),
            Self::ListError(e) => write!(f, "{}", e),
            Self::DispatchError(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RoleApiError::CreateError(CreateRoleError::DuplicateName("admin".to_string()));
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_routes_structure() {
        // Verify that the router can be constructed
        let router = roles_routes();
        assert!(format!("{:?}", router).contains("Router"));
    }
}
