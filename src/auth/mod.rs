//! Caller authentication for the admin API
//!
//! Requests carry a Firebase ID token as a bearer token. Verification is
//! behind [`TokenVerifier`] so routes can be exercised with
//! [`MockTokenVerifier`].

pub mod mock;
pub mod verifier;

pub use mock::MockTokenVerifier;
pub use verifier::FirebaseTokenVerifier;

use crate::{Error, Result};
use async_trait::async_trait;
use axum::http::{header, HeaderMap};

/// Roles allowed to manage any instructor's courses.
const ADMIN_ROLES: &[&str] = &["admin", "superadmin"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub uid: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|role| ADMIN_ROLES.contains(&role))
    }

    /// Whether this caller may act on behalf of `instructor_id`.
    pub fn ensure_can_act_for(&self, instructor_id: &str) -> Result<()> {
        if self.uid == instructor_id || self.is_admin() {
            Ok(())
        } else {
            Err(Error::Forbidden(
                "You can only manage images for your own courses".to_string(),
            ))
        }
    }
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify_id_token(&self, token: &str) -> Result<AuthenticatedUser>;
}

/// Pulls the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized("Authentication required".to_string()))?
        .to_str()
        .map_err(|_| Error::Unauthorized("Malformed Authorization header".to_string()))?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Unauthorized("Expected a bearer token".to_string()))?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn user(uid: &str, role: Option<&str>) -> AuthenticatedUser {
        AuthenticatedUser {
            uid: uid.to_string(),
            email: None,
            role: role.map(str::to_string),
        }
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(Error::Unauthorized(_))));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(bearer_token(&headers), Err(Error::Unauthorized(_))));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(matches!(bearer_token(&headers), Err(Error::Unauthorized(_))));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok-123"));
        assert_eq!(bearer_token(&headers).unwrap(), "tok-123");
    }

    #[test]
    fn test_instructor_can_act_for_self_only() {
        let instructor = user("inst-1", Some("instructor"));
        assert!(instructor.ensure_can_act_for("inst-1").is_ok());
        assert!(matches!(
            instructor.ensure_can_act_for("inst-2"),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn test_admins_can_act_for_anyone() {
        assert!(user("root", Some("superadmin"))
            .ensure_can_act_for("inst-2")
            .is_ok());
        assert!(user("ops", Some("admin")).ensure_can_act_for("inst-2").is_ok());
        assert!(user("student", None).ensure_can_act_for("inst-2").is_err());
    }
}
