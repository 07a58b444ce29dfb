//! Judge0 HTTP client
//!
//! Wire types for the batch submission endpoints and the `JudgeClient` seam
//! the judger talks to. `Judge0Client` is the reqwest-backed implementation.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::core::JudgeStatus;

/// One piece of code to run against one stdin/expected output pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub source_code: String,
    pub language_id: u32,
    pub stdin: String,
    pub expected_output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionStatus {
    pub id: u32,
    pub description: String,
}

/// Result of one submission as reported by the judge service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    #[serde(default)]
    pub token: Option<String>,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    /// Wall time in seconds, as the decimal string Judge0 reports
    #[serde(default)]
    pub time: Option<String>,
    /// Peak memory in KB
    #[serde(default)]
    pub memory: Option<u64>,
}

impl SubmissionResult {
    pub fn judge_status(&self) -> JudgeStatus {
        JudgeStatus::from_id(self.status.id)
    }
}

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("judge service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("judge service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed judge service response: {0}")]
    MalformedResponse(String),

    #[error("submissions still pending after {attempts} poll attempts")]
    PollTimeout { attempts: u32 },
}

/// Batch API of the judge service
#[async_trait]
pub trait JudgeClient: Send + Sync {
    /// Submit a batch; returns one tracking token per submission, in order
    async fn submit_batch(
        &self,
        submissions: &[SubmissionRequest],
    ) -> Result<Vec<String>, JudgeError>;

    /// Fetch the current state of every token, in order
    async fn fetch_batch(&self, tokens: &[String]) -> Result<Vec<SubmissionResult>, JudgeError>;
}

/// Connection settings for a Judge0 instance
#[derive(Debug, Clone)]
pub struct Judge0Settings {
    pub base_url: String,
    /// RapidAPI key, only needed for the hosted Judge0 CE
    pub api_key: Option<String>,
    pub api_host: Option<String>,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct BatchSubmitBody<'a> {
    submissions: &'a [SubmissionRequest],
}

#[derive(Deserialize)]
struct TokenEntry {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Deserialize)]
struct BatchStatusBody {
    submissions: Vec<SubmissionResult>,
}

#[derive(Debug, Clone)]
pub struct Judge0Client {
    client: Client,
    base_url: String,
}

impl Judge0Client {
    pub fn new(settings: &Judge0Settings) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(key) = &settings.api_key {
            headers.insert(
                "x-rapidapi-key",
                header::HeaderValue::from_str(key).context("Invalid JUDGE0_API_KEY")?,
            );
        }
        if let Some(host) = &settings.api_host {
            headers.insert(
                "x-rapidapi-host",
                header::HeaderValue::from_str(host).context("Invalid JUDGE0_API_HOST")?,
            );
        }

        let client = Client::builder()
            .timeout(settings.timeout)
            .default_headers(headers)
            .build()
            .context("Failed to build judge0 HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
        })
    }

    fn get_url(&self, path: &str) -> String {
        let mut url = self.base_url.trim_end_matches('/').to_string();
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);
        url
    }

    /// Read a successful response body; non-2xx responses become `JudgeError::Status`
    async fn read_body(response: reqwest::Response) -> Result<Vec<u8>, JudgeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JudgeError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, JudgeError> {
    serde_json::from_slice(body).map_err(|e| JudgeError::MalformedResponse(e.to_string()))
}

#[async_trait]
impl JudgeClient for Judge0Client {
    async fn submit_batch(
        &self,
        submissions: &[SubmissionRequest],
    ) -> Result<Vec<String>, JudgeError> {
        let response = self
            .client
            .post(self.get_url("/submissions/batch"))
            .query(&[("base64_encoded", "false")])
            .json(&BatchSubmitBody { submissions })
            .send()
            .await?;

        let entries: Vec<TokenEntry> = decode(&Self::read_body(response).await?)?;
        debug!("Judge0 accepted batch of {} submissions", entries.len());

        entries
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| {
                entry.token.ok_or_else(|| {
                    JudgeError::MalformedResponse(format!("submission {} has no token", idx))
                })
            })
            .collect()
    }

    async fn fetch_batch(&self, tokens: &[String]) -> Result<Vec<SubmissionResult>, JudgeError> {
        let joined = tokens.join(",");
        let response = self
            .client
            .get(self.get_url("/submissions/batch"))
            .query(&[("tokens", joined.as_str()), ("base64_encoded", "false")])
            .send()
            .await?;

        let body: BatchStatusBody = decode(&Self::read_body(response).await?)?;
        Ok(body.submissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(base_url: String) -> Judge0Client {
        Judge0Client::new(&Judge0Settings {
            base_url,
            api_key: None,
            api_host: None,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    async fn fake_submit(
        Query(params): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> Result<Json<Value>, StatusCode> {
        if params.get("base64_encoded").map(String::as_str) != Some("false") {
            return Err(StatusCode::BAD_REQUEST);
        }
        let submissions = body["submissions"].as_array().ok_or(StatusCode::BAD_REQUEST)?;
        let tokens: Vec<Value> = submissions
            .iter()
            .map(|s| json!({ "token": format!("tok-{}", s["stdin"].as_str().unwrap_or("")) }))
            .collect();
        Ok(Json(Value::Array(tokens)))
    }

    async fn fake_fetch(
        Query(params): Query<HashMap<String, String>>,
    ) -> Result<Json<Value>, StatusCode> {
        if params.get("base64_encoded").map(String::as_str) != Some("false") {
            return Err(StatusCode::BAD_REQUEST);
        }
        let tokens = params.get("tokens").ok_or(StatusCode::BAD_REQUEST)?;
        let submissions: Vec<Value> = tokens
            .split(',')
            .map(|token| {
                json!({
                    "token": token,
                    "status": { "id": 3, "description": "Accepted" },
                    "stdout": format!("{}\n", token),
                    "stderr": null,
                    "time": "0.012",
                    "memory": 3200
                })
            })
            .collect();
        Ok(Json(json!({ "submissions": submissions })))
    }

    fn request(stdin: &str) -> SubmissionRequest {
        SubmissionRequest {
            source_code: "print(input())".into(),
            language_id: 71,
            stdin: stdin.into(),
            expected_output: stdin.into(),
        }
    }

    #[tokio::test]
    async fn test_submit_batch_returns_tokens_in_order() {
        let base_url = spawn(Router::new().route("/submissions/batch", post(fake_submit))).await;
        let client = client_for(base_url);

        let tokens = client
            .submit_batch(&[request("a"), request("b"), request("c")])
            .await
            .unwrap();

        assert_eq!(tokens, vec!["tok-a", "tok-b", "tok-c"]);
    }

    #[tokio::test]
    async fn test_fetch_batch_sends_csv_tokens() {
        let base_url = spawn(
            Router::new().route("/submissions/batch", post(fake_submit).get(fake_fetch)),
        )
        .await;
        let client = client_for(format!("{}/", base_url));

        let results = client
            .fetch_batch(&["x".to_string(), "y".to_string()])
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].token.as_deref(), Some("x"));
        assert_eq!(results[1].stdout.as_deref(), Some("y\n"));
        assert_eq!(results[1].memory, Some(3200));
        assert!(results[0].judge_status().is_accepted());
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let router = Router::new().route(
            "/submissions/batch",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "queue full") }),
        );
        let client = client_for(spawn(router).await);

        let err = client.submit_batch(&[request("a")]).await.unwrap_err();
        match err {
            JudgeError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "queue full");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_token_is_malformed() {
        let router = Router::new().route(
            "/submissions/batch",
            post(|| async { Json(json!([{ "token": "t1" }, { "error": "language_id is invalid" }])) }),
        );
        let client = client_for(spawn(router).await);

        let err = client
            .submit_batch(&[request("a"), request("b")])
            .await
            .unwrap_err();
        assert!(matches!(err, JudgeError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let router = Router::new().route("/submissions/batch", post(|| async { "<html>" }));
        let client = client_for(spawn(router).await);

        let err = client.submit_batch(&[request("a")]).await.unwrap_err();
        assert!(matches!(err, JudgeError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(format!("http://{}", addr));
        let err = client.fetch_batch(&["t".to_string()]).await.unwrap_err();
        assert!(matches!(err, JudgeError::Transport(_)));
    }
}
