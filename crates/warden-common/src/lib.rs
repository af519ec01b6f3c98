//! Warden Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared infrastructure for the Warden workspace members.
//!
//! # Overview
//!
//! This crate provides functionality used across all Warden services:
//!
//! - **Logging**: Structured logging setup with console/file targets
//! - **JSON utilities**: Payload shaping helpers for audit records
//!
//! # Example
//!
//! ```no_run
//! use warden_common::logging::{LogConfig, init_logging};
//! use tracing::info;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!
//!     info!("Application started");
//!     Ok(())
//! }
//! ```

pub mod json;
pub mod logging;
