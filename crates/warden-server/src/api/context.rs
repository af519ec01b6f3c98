//! Caller identity extraction
//!
//! [`CallerContext`] carries who issued a request and from where. Routes
//! extract it from request parts and hand it to the dispatcher, which
//! records both fields verbatim on the audit entry. Absence of either
//! field is not an error; unauthenticated traffic is still audited.

use std::convert::Infallible;
use std::net::SocketAddr;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

/// Identity under which a request runs.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    /// Taken from the `x-user-email` header, when present.
    pub user_email: Option<String>,
    /// Client address from the connection info, when the listener provides it.
    pub ip_address: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_email = parts
            .headers
            .get("x-user-email")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let ip_address = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());

        Ok(Self {
            user_email,
            ip_address,
        })
    }
}
