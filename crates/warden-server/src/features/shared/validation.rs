//! Shared validation utilities
//!
//! Provides common validation functions for input data across commands and queries.
//!
//! # Examples
//!
//! ```rust,ignore
//! use warden_server::features::shared::validation::{validate_email, validate_name};
//!
//! // Validate an email address
//! validate_email("ops@example.com", 320)?;
//!
//! // Validate a display name
//! validate_name("Ada Lovelace", 256)?;
//! ```

use thiserror::Error;

/// Errors that can occur during email validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmailValidationError {
    #[error("Email is required and cannot be empty")]
    Required,

    #[error("Email must be between 1 and {max_length} characters")]
    TooLong { max_length: usize },

    #[error("Email must have the form local@domain")]
    InvalidFormat,
}

/// Errors that can occur during name validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameValidationError {
    #[error("Name is required and cannot be empty")]
    Required,

    #[error("Name must be between 1 and {max_length} characters")]
    TooLong { max_length: usize },
}

/// Validate an email address
///
/// # Rules
/// - Must not be empty
/// - Must not exceed max_length characters
/// - Must contain exactly one `@` with a non-empty local part and a
///   dotted domain part
///
/// # Arguments
/// * `email` - The email address to validate
/// * `max_length` - Maximum allowed length (typically 320)
///
/// # Returns
/// Ok(()) if valid, or an EmailValidationError
pub fn validate_email(email: &str, max_length: usize) -> Result<(), EmailValidationError> {
    if email.is_empty() {
        return Err(EmailValidationError::Required);
    }

    if email.len() > max_length {
        return Err(EmailValidationError::TooLong { max_length });
    }

    if !is_valid_email(email) {
        return Err(EmailValidationError::InvalidFormat);
    }

    Ok(())
}

/// Check if an email address has the shape `local@domain.tld`
///
/// This is a basic structural check. For full RFC 5321 validation,
/// consider using a dedicated email parsing library.
#[inline]
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.is_empty() {
        return false;
    }

    // Domain needs at least one dot with labels on both sides
    domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.') && !domain.contains('@')
}

/// Validate a name field
///
/// # Rules
/// - Must not be empty (after trimming whitespace)
/// - Must not exceed max_length characters
///
/// # Arguments
/// * `name` - The name to validate
/// * `max_length` - Maximum allowed length (typically 256)
///
/// # Returns
/// Ok(()) if valid, or a NameValidationError
pub fn validate_name(name: &str, max_length: usize) -> Result<(), NameValidationError> {
    if name.trim().is_empty() {
        return Err(NameValidationError::Required);
    }

    if name.len() > max_length {
        return Err(NameValidationError::TooLong { max_length });
    }

    Ok(())
}
