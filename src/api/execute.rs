//! Run a user's code against a problem's testcases

use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{ApiError, AppState, Json};
use crate::auth::AuthUser;
use crate::judger::{build_submissions, run_batch};
use crate::judge0::SubmissionResult;

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    #[serde(alias = "sourceCode")]
    pub source_code: String,
    pub language: String,
}

/// Outcome of one testcase
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestcaseReport {
    pub testcase: usize,
    pub passed: bool,
    pub status: String,
    pub stdout: Option<String>,
    pub expected: String,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
    pub time: Option<String>,
    pub memory: Option<u64>,
}

impl TestcaseReport {
    fn new(index: usize, expected: &str, result: SubmissionResult) -> Self {
        Self {
            testcase: index + 1,
            passed: result.judge_status().is_accepted(),
            status: result.status.description,
            stdout: result.stdout.map(|s| s.trim().to_string()),
            expected: expected.trim().to_string(),
            stderr: result.stderr,
            compile_output: result.compile_output,
            time: result.time.map(|t| format!("{} s", t)),
            memory: result.memory,
        }
    }
}

pub async fn execute_code(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(problem_id): Path<String>,
    Json(body): Json<ExecuteRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.source_code.trim().is_empty() {
        return Err(ApiError::BadRequest("Source code is required".into()));
    }

    let language = state.languages.resolve(&body.language).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "{} is not supported. Please use one of the following: {}.",
            body.language,
            state.languages.supported().join(", ")
        ))
    })?;

    let problem = state
        .problems
        .get_problem(&problem_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Problem not found".into()))?;
    let testcases = &problem.draft.testcases;

    let submissions = build_submissions(
        &body.source_code,
        language.judge0_id,
        testcases
            .iter()
            .map(|tc| (tc.input.as_str(), tc.output.as_str())),
    );
    let results = run_batch(
        state.judge.as_ref(),
        &submissions,
        &state.config.poll_policy,
    )
    .await?;

    let reports: Vec<TestcaseReport> = results
        .into_iter()
        .zip(testcases)
        .enumerate()
        .map(|(idx, (result, tc))| TestcaseReport::new(idx, &tc.output, result))
        .collect();
    let passed = reports.iter().all(|r| r.passed);

    info!(
        "Code executed: problem={}, user={}, language={}, passed={}",
        problem.id, caller.user.id, language.name, passed
    );

    Ok(Json(json!({
        "success": true,
        "message": "Code executed successfully",
        "passed": passed,
        "language": state.languages.display_name(language.judge0_id),
        "results": reports,
    })))
}
