//! Warden Server Library
#![recursion_limit = "256"]
//!
//! HTTP server for managing portal user accounts with a full audit trail.
//!
//! # Overview
//!
//! The warden server provides a REST API for account administration:
//!
//! - **API Endpoints**: RESTful API for user and role management
//! - **Database Management**: PostgreSQL integration with SQLx
//! - **Audit Pipeline**: Every state change fans out to pluggable audit sinks
//! - **Configuration**: Environment-based configuration management
//! - **Middleware**: CORS and request logging
//!
//! # Architecture
//!
//! The server follows a **CQRS (Command Query Responsibility Segregation)** architecture:
//!
//! ## CQRS Pattern
//!
//! - **Commands** (Write Operations): Create, Update, Delete operations that modify state
//!   - Successful commands are recorded through every configured audit sink
//!   - Executed via HTTP POST, PUT, DELETE methods
//!   - Examples: Create user, update user, create role
//!
//! - **Queries** (Read Operations): Retrieve operations that read state
//!   - Recorded only through sinks that accept reads; most queries skip the
//!     relational sink to reduce noise
//!   - Executed via HTTP GET method
//!   - Examples: List users, get user details
//!
//! ## Audit Pipeline
//!
//! Each recorded operation captures:
//! - Category (stable dotted operation name) and request kind
//! - Caller email and client IP (when present)
//! - Request payload, and response payload for opted-in queries
//! - Target entity id for entity-scoped commands
//! - Success flag and handler duration
//!
//! Three sinks ship by default: the relational `audit_log` table, a
//! non-blocking network forwarder, and trace-correlated log records.
//! Query the relational trail via the `/audit` endpoint.
//!
//! ## Framework Stack
//!
//! - **Axum**: Modern, ergonomic web framework
//! - **SQLx**: Async PostgreSQL driver and query layer
//! - **Tower**: Middleware and service abstractions
//! - **Mediator**: Request dispatch for the CQRS layer

pub mod api;
pub mod audit;
pub mod config;
pub mod cqrs;
pub mod error;
pub mod features;
pub mod middleware;
pub mod telemetry;

// Re-export commonly used types
pub use error::{AppError, ServerResult};
