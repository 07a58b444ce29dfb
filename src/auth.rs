//! Authentication and authorization
//!
//! `AuthUser` identifies the caller from a session token; role checks go
//! through `AuthUser::require_role`, and `AdminUser` bundles both for
//! admin-only handlers.

use anyhow::Context;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::api::{ApiError, AppState};
use crate::store::{Role, User};

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

/// Argon2 hash of `password`, computed on the blocking pool
pub async fn hash_password(password: &str) -> anyhow::Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
    })
    .await
    .context("Password hashing task failed")?
}

/// Check `password` against a stored Argon2 hash on the blocking pool.
/// A malformed hash never matches.
pub async fn verify_password(password: &str, password_hash: &str) -> anyhow::Result<bool> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    tokio::task::spawn_blocking(move || match PasswordHash::new(&password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    })
    .await
    .context("Password verification task failed")
}

/// Random 64-character hex token
pub fn new_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// SHA-256 hex digest; tokens are only ever stored in this form
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Session token from `Authorization: Bearer …`, falling back to the session cookie
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

impl AuthUser {
    pub fn require_role(&self, role: Role) -> Result<(), ApiError> {
        if self.user.role == role {
            return Ok(());
        }
        debug!(
            "Denied user {} (role {:?}), requires {:?}",
            self.user.id, self.user.role, role
        );
        Err(ApiError::Forbidden(match role {
            Role::Admin => "Access denied. Admins only.".into(),
            Role::User => "Access denied.".into(),
        }))
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = session_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("You are not logged in.".into()))?;

        let user_id = state
            .users
            .session_user(&token)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session.".into()))?;

        let user = state
            .users
            .get_user(&user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("User not found.".into()))?;

        Ok(AuthUser { user, token })
    }
}

/// An authenticated caller holding the ADMIN role
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let caller = AuthUser::from_request_parts(parts, state).await?;
        caller.require_role(Role::Admin)?;
        Ok(AdminUser(caller))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{login_as, test_state};
    use crate::stubs::ScriptedJudge;
    use axum::http::{HeaderValue, Request, StatusCode};
    use std::sync::Arc;

    fn parts_with(header_name: header::HeaderName, value: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(header_name, HeaderValue::from_str(value).unwrap())
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[tokio::test]
    async fn test_password_round_trip() {
        let hash = hash_password("hunter22").await.unwrap();
        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22", &hash).await.unwrap());
        assert!(!verify_password("hunter23", &hash).await.unwrap());
        assert!(!verify_password("hunter22", "not-a-hash").await.unwrap());
    }

    #[test]
    fn test_tokens_are_random_hex() {
        let a = new_token();
        let b = new_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_token_is_sha256_hex() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_session_token_sources() {
        let bearer = parts_with(header::AUTHORIZATION, "Bearer abc");
        assert_eq!(session_token(&bearer.headers).as_deref(), Some("abc"));

        let cookie = parts_with(header::COOKIE, "theme=dark; session=xyz; other=1");
        assert_eq!(session_token(&cookie.headers).as_deref(), Some("xyz"));

        let basic = parts_with(header::AUTHORIZATION, "Basic abc");
        assert!(session_token(&basic.headers).is_none());
    }

    #[tokio::test]
    async fn test_missing_session_is_unauthorized() {
        let state = test_state(Arc::new(ScriptedJudge::new()));
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();

        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let mut parts = parts_with(header::AUTHORIZATION, "Bearer unknown");
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_extractor_checks_role() {
        let state = test_state(Arc::new(ScriptedJudge::new()));
        let user_token = login_as(&state, "user@example.com", Role::User).await;
        let admin_token = login_as(&state, "admin@example.com", Role::Admin).await;

        let mut parts = parts_with(header::AUTHORIZATION, &format!("Bearer {}", user_token));
        let caller = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(caller.user.email, "user@example.com");
        let err = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let mut parts = parts_with(header::COOKIE, &format!("session={}", admin_token));
        let AdminUser(admin) = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(admin.user.role, Role::Admin);
    }
}
