//! Shared utilities and types for feature modules
//!
//! This module contains reusable code to reduce duplication across feature implementations.
//!
//! # Contents
//!
//! - **pagination**: Common pagination types and helpers
//! - **validation**: Input validation utilities

pub mod pagination;
pub mod validation;

// Re-export commonly used types
pub use pagination::{PaginationMetadata, PaginationParams};
pub use validation::{validate_email, validate_name, EmailValidationError, NameValidationError};
