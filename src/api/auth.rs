//! Account handlers: register, verify, login, logout, profile

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{ApiError, AppState, Json};
use crate::auth::{hash_password, hash_token, new_token, verify_password, AuthUser, SESSION_COOKIE};
use crate::mail::{self, MailContent};
use crate::store::{NewUser, Role, User};

/// Verification links stay valid for 10 minutes
const VERIFICATION_TTL: Duration = Duration::from_secs(10 * 60);

/// Minimum gap between two verification emails
const RESEND_COOLDOWN_SECS: i64 = 2 * 60;

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 13;
const PASSWORD_MIN_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub fullname: Option<String>,
    pub password: String,
}

impl RegisterRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let email = self.email.trim();
        let username = self.username.trim();

        if email.is_empty() || username.is_empty() || self.password.is_empty() {
            return Err(ApiError::BadRequest("All fields are required.".into()));
        }
        if !is_valid_email(email) {
            return Err(ApiError::BadRequest("Email is invalid".into()));
        }
        let len = username.chars().count();
        if len < USERNAME_MIN_LEN {
            return Err(ApiError::BadRequest(format!(
                "Username must be at least {} characters long",
                USERNAME_MIN_LEN
            )));
        }
        if len > USERNAME_MAX_LEN {
            return Err(ApiError::BadRequest(format!(
                "Username must be at most {} characters long",
                USERNAME_MAX_LEN
            )));
        }
        if self.password.chars().count() < PASSWORD_MIN_LEN {
            return Err(ApiError::BadRequest(format!(
                "Password must be at least {} characters",
                PASSWORD_MIN_LEN
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn session_cookie(token: &str, max_age: Duration) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        max_age.as_secs()
    )
}

/// Issue a fresh verification token and mail its link to the user
async fn send_verification(
    state: &AppState,
    user: &mut User,
    render: fn(&str, &str) -> MailContent,
) -> Result<(), ApiError> {
    let token = new_token();
    state
        .users
        .save_verification_token(&hash_token(&token), &user.id, VERIFICATION_TTL)
        .await?;

    user.last_verification_sent = Some(Utc::now());
    state.users.update_user(user).await?;

    let url = format!(
        "{}/api/v1/auth/verify/{}",
        state.config.base_url.trim_end_matches('/'),
        token
    );
    mail::send_best_effort(
        state.mailer.as_ref(),
        &user.email,
        render(&user.username, &url),
    )
    .await;

    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    body.validate()?;

    let email = body.email.trim().to_lowercase();
    if state
        .users
        .find_user_by_login(Some(email.as_str()), None)
        .await?
        .is_some()
    {
        return Err(ApiError::BadRequest(
            "User with this email already exists.".into(),
        ));
    }

    let role = if state.config.is_admin_email(&email) {
        Role::Admin
    } else {
        Role::User
    };
    let password_hash = hash_password(&body.password)
        .await
        .map_err(ApiError::internal)?;

    let mut user = state
        .users
        .create_user(NewUser {
            email,
            username: body.username.trim().to_string(),
            fullname: body.fullname.filter(|f| !f.trim().is_empty()),
            password_hash,
            role,
        })
        .await?;
    info!("User registered: id={}, role={:?}", user.id, user.role);

    send_verification(&state, &mut user, mail::verification_email).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User created successfully. Please check your email to verify your account.",
            "user": user.profile(),
        })),
    ))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let not_found = || ApiError::NotFound("User not found or token expired".into());

    let user_id = state
        .users
        .take_verification_token(&hash_token(&token))
        .await?
        .ok_or_else(not_found)?;
    let mut user = state.users.get_user(&user_id).await?.ok_or_else(not_found)?;

    user.email_verified = true;
    user.last_verification_sent = None;
    state.users.update_user(&user).await?;
    info!("User email verified: id={}", user.id);

    Ok(Json(json!({
        "success": true,
        "message": "Email verified successfully",
    })))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    Json(body): Json<ResendVerificationRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = body.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::BadRequest("Email is required.".into()));
    }

    let mut user = state
        .users
        .find_user_by_login(Some(email.as_str()), None)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".into()))?;

    if user.email_verified {
        return Err(ApiError::BadRequest("Email is already verified.".into()));
    }

    if let Some(last_sent) = user.last_verification_sent {
        let elapsed = (Utc::now() - last_sent).num_seconds();
        if elapsed < RESEND_COOLDOWN_SECS {
            return Err(ApiError::TooManyRequests(format!(
                "Please wait {} seconds before requesting another verification email.",
                RESEND_COOLDOWN_SECS - elapsed
            )));
        }
    }

    send_verification(&state, &mut user, mail::resend_verification_email).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Verification email resent successfully.",
    })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let email = non_empty(&body.email).map(str::to_lowercase);
    let username = non_empty(&body.username);
    if (email.is_none() && username.is_none()) || body.password.is_empty() {
        return Err(ApiError::BadRequest("All fields are required.".into()));
    }

    let user = state
        .users
        .find_user_by_login(email.as_deref(), username)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".into()))?;

    let password_ok = verify_password(&body.password, &user.password_hash)
        .await
        .map_err(ApiError::internal)?;
    if !password_ok {
        return Err(ApiError::Unauthorized("Invalid password.".into()));
    }

    let token = new_token();
    let ttl = state.config.session_ttl;
    state.users.create_session(&token, &user.id, ttl).await?;
    info!("User logged in: id={}", user.id);

    Ok((
        [(header::SET_COOKIE, session_cookie(&token, ttl))],
        Json(json!({
            "success": true,
            "message": "Login successful",
            "accessToken": token,
            "user": user.profile(),
        })),
    )
        .into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Response, ApiError> {
    state.users.delete_session(&caller.token).await?;
    info!("User logged out: id={}", caller.user.id);

    Ok((
        [(header::SET_COOKIE, session_cookie("", Duration::ZERO))],
        Json(json!({
            "success": true,
            "message": "Logout successful.",
        })),
    )
        .into_response())
}

pub async fn me(caller: AuthUser) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "message": "User authenticated successfully",
        "user": caller.user.profile(),
    }))
}
