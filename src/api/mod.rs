//! HTTP API
//!
//! Routes live under `/api/v1`. Handlers share an `AppState` holding the
//! injected judge client, stores and mailer.

pub mod auth;
pub mod error;
pub mod execute;
pub mod problems;

use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;

pub use error::ApiError;

use crate::config::Config;
use crate::judge0::JudgeClient;
use crate::languages::Languages;
use crate::mail::Mailer;
use crate::store::{ProblemStore, UserStore};
use crate::validator::ProblemValidator;

/// JSON body extractor and response; malformed bodies are rejected with
/// the `ApiError` envelope
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Query string extractor rejecting with the `ApiError` envelope
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct Query<T>(pub T);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub languages: Arc<Languages>,
    pub judge: Arc<dyn JudgeClient>,
    pub problems: Arc<dyn ProblemStore>,
    pub users: Arc<dyn UserStore>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn validator(&self) -> ProblemValidator<'_> {
        ProblemValidator::new(
            self.judge.as_ref(),
            self.languages.as_ref(),
            self.config.poll_policy,
        )
    }
}

pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/verify/{token}", get(auth::verify_email))
        .route("/resend-verification", post(auth::resend_verification))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let problem_routes = Router::new()
        .route(
            "/",
            get(problems::list_problems).post(problems::create_problem),
        )
        .route(
            "/{id}",
            get(problems::get_problem)
                .put(problems::update_problem)
                .delete(problems::delete_problem),
        )
        .route("/{id}/execute", post(execute::execute_code));

    Router::new()
        .route("/", get(|| async { "judgehub is running" }))
        .nest("/api/v1/auth", auth_routes)
        .nest("/api/v1/problems", problem_routes)
        .with_state(state)
}
