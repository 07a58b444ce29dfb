//! Problem handlers
//!
//! Creating or updating a problem runs every reference solution through the
//! judge first; only fully validated problems are written.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{json, Value};
use tracing::info;

use super::{ApiError, AppState, Json, Query};
use crate::auth::{AdminUser, AuthUser};
use crate::store::{ProblemDraft, ProblemFilter};

fn check_draft(draft: &ProblemDraft) -> Result<(), ApiError> {
    if draft.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title is required".into()));
    }
    if draft.testcases.is_empty() {
        return Err(ApiError::BadRequest("At least one testcase is required".into()));
    }
    if draft.reference_solutions.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one reference solution is required".into(),
        ));
    }
    Ok(())
}

fn problem_not_found() -> ApiError {
    ApiError::NotFound("Problem not found".into())
}

pub async fn create_problem(
    State(state): State<AppState>,
    AdminUser(caller): AdminUser,
    Json(draft): Json<ProblemDraft>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    check_draft(&draft)?;

    let problem = state
        .validator()
        .create_problem(state.problems.as_ref(), &caller.user.id, draft)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Problem created successfully",
            "problem": problem,
        })),
    ))
}

pub async fn list_problems(
    State(state): State<AppState>,
    _caller: AuthUser,
    Query(filter): Query<ProblemFilter>,
) -> Result<Json<Value>, ApiError> {
    let problems = state.problems.list_problems(&filter).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Problems fetched successfully",
        "problems": problems,
    })))
}

pub async fn get_problem(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let problem = state
        .problems
        .get_problem(&id)
        .await?
        .ok_or_else(problem_not_found)?;

    Ok(Json(json!({
        "success": true,
        "message": "Problem fetched successfully",
        "problem": problem,
    })))
}

pub async fn update_problem(
    State(state): State<AppState>,
    AdminUser(caller): AdminUser,
    Path(id): Path<String>,
    Json(draft): Json<ProblemDraft>,
) -> Result<Json<Value>, ApiError> {
    check_draft(&draft)?;

    if state.problems.get_problem(&id).await?.is_none() {
        return Err(problem_not_found());
    }

    let problem = state
        .validator()
        .update_problem(state.problems.as_ref(), &id, draft)
        .await?
        .ok_or_else(problem_not_found)?;
    info!("Problem updated: id={}, by={}", problem.id, caller.user.id);

    Ok(Json(json!({
        "success": true,
        "message": "Problem updated successfully",
        "problem": problem,
    })))
}

pub async fn delete_problem(
    State(state): State<AppState>,
    AdminUser(caller): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.problems.delete_problem(&id).await? {
        return Err(problem_not_found());
    }
    info!("Problem deleted: id={}, by={}", id, caller.user.id);

    Ok(Json(json!({
        "success": true,
        "message": "Problem deleted successfully",
    })))
}
