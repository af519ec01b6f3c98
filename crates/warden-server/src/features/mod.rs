//! Feature modules implementing the admin API
//!
//! This module contains all feature slices following the CQRS (Command Query Responsibility
//! Segregation) pattern. Each feature is organized as a vertical slice with its own
//! commands, queries, and routes.
//!
//! # Features
//!
//! - **roles**: Role reference data (creation audited, listing not)
//! - **users**: Portal user account management
//!
//! # Architecture
//!
//! Each feature module follows the structure:
//! - `commands/` - Write operations (create, update, delete)
//! - `queries/` - Read operations (get, list)
//! - `routes.rs` - HTTP route definitions
//!
//! Commands and queries implement the mediator pattern using the `mediator` crate.
//! Route handlers dispatch through [`crate::cqrs::middleware::Dispatcher`], which owns
//! the mediator and fans successful operations out to the configured audit sinks.

pub mod roles;
pub mod shared;
pub mod users;

use std::sync::Arc;

use axum::Router;

use crate::cqrs::middleware::Dispatcher;

/// Shared state for all feature routes
///
/// Contains the database connection pool and the audit-aware dispatcher
/// that route handlers send commands and queries through.
#[derive(Clone)]
pub struct FeatureState {
    /// PostgreSQL connection pool for database operations
    pub db: sqlx::PgPool,
    /// Mediator dispatcher with audit fan-out
    pub dispatcher: Arc<Dispatcher>,
}

/// Creates the main API router with all feature routes mounted
///
/// Each feature is mounted under its own path prefix:
/// - `/users` - User account management
/// - `/roles` - Role reference data
///
/// # Arguments
///
/// * `state` - Shared state containing the database pool and dispatcher
///
/// # Returns
///
/// An Axum router with all feature routes configured
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .nest("/users", users::users_routes().with_state(state.clone()))
        .nest("/roles", roles::roles_routes().with_state(state))
}
