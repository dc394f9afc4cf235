//! Authentication and request identity.
//!
//! Two independent mechanisms exist:
//!
//! - The management API identifies operators through a trusted proxy header
//!   (the deployment sits behind an SSO-terminating proxy); see
//!   [`current_user`].
//! - The public execution API authenticates callers with per-(user, model)
//!   access tokens carried in `X-Access-Token`; see [`tokens`].

pub mod current_user;
pub mod tokens;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use std::convert::Infallible;
use std::net::SocketAddr;

use crate::AppState;
use crate::api::models::users::CurrentUser;
use crate::errors::{Error, Result};

/// Reject non-admin operators for mutating management calls.
pub fn require_admin(user: &CurrentUser) -> Result<()> {
    if user.is_admin {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            action: "manage".to_string(),
            resource: "organization resources".to_string(),
        })
    }
}

/// Source address of a request, used to key rate-limit windows and the audit
/// trail. Prefers `X-Forwarded-For` (first hop), falls back to the socket
/// peer address, and never rejects.
#[derive(Debug, Clone)]
pub struct SourceAddr(pub String);

impl FromRequestParts<AppState> for SourceAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        if let Some(forwarded) = parts.headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return Ok(SourceAddr(first.to_string()));
                }
            }
        }

        let addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(SourceAddr(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::CurrentUser;
    use uuid::Uuid;

    #[test]
    fn test_require_admin() {
        let admin = CurrentUser {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            email: "admin@example.com".to_string(),
            display_name: None,
            is_admin: true,
        };
        assert!(require_admin(&admin).is_ok());

        let operator = CurrentUser { is_admin: false, ..admin };
        let err = require_admin(&operator).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }
}
