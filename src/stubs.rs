//! Test doubles for the judge service and the mailer

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::JudgeStatus;
use crate::judge0::{
    JudgeClient, JudgeError, SubmissionRequest, SubmissionResult, SubmissionStatus,
};
use crate::mail::{MailContent, Mailer};

pub fn result_with_status(id: u32) -> SubmissionResult {
    SubmissionResult {
        token: None,
        status: SubmissionStatus {
            id,
            description: JudgeStatus::from_id(id).to_string(),
        },
        stdout: None,
        stderr: None,
        compile_output: None,
        time: None,
        memory: None,
    }
}

#[derive(Debug)]
struct Batch {
    requests: Vec<SubmissionRequest>,
    statuses: Vec<u32>,
    fetches: u32,
}

#[derive(Debug, Default)]
struct ScriptState {
    outcomes: VecDeque<Vec<u32>>,
    batches: Vec<Batch>,
    submit_calls: usize,
    fetch_calls: usize,
}

/// Judge service stub; each submitted batch takes the next scripted list of
/// final status ids (all accepted when the script runs out)
#[derive(Debug, Default)]
pub struct ScriptedJudge {
    state: Mutex<ScriptState>,
    pending_rounds: u32,
    dropped_tokens: usize,
    fail_submit: bool,
}

impl ScriptedJudge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch(self, statuses: Vec<u32>) -> Self {
        self.state.lock().unwrap().outcomes.push_back(statuses);
        self
    }

    /// Keep the last submission of every batch processing for this many polls
    pub fn pending_rounds(mut self, rounds: u32) -> Self {
        self.pending_rounds = rounds;
        self
    }

    /// Return this many fewer tokens than submissions
    pub fn dropping_tokens(mut self, count: usize) -> Self {
        self.dropped_tokens = count;
        self
    }

    pub fn failing_submit(mut self) -> Self {
        self.fail_submit = true;
        self
    }

    pub fn submit_calls(&self) -> usize {
        self.state.lock().unwrap().submit_calls
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.lock().unwrap().fetch_calls
    }

    /// Every batch submitted so far, in submission order
    pub fn submitted(&self) -> Vec<Vec<SubmissionRequest>> {
        self.state
            .lock()
            .unwrap()
            .batches
            .iter()
            .map(|b| b.requests.clone())
            .collect()
    }

    pub fn request_for(&self, token: &str) -> Option<SubmissionRequest> {
        let (batch, idx) = parse_token(token)?;
        let state = self.state.lock().unwrap();
        state.batches.get(batch)?.requests.get(idx).cloned()
    }
}

fn parse_token(token: &str) -> Option<(usize, usize)> {
    let (batch, idx) = token.strip_prefix('b')?.split_once('-')?;
    Some((batch.parse().ok()?, idx.parse().ok()?))
}

#[async_trait]
impl JudgeClient for ScriptedJudge {
    async fn submit_batch(
        &self,
        submissions: &[SubmissionRequest],
    ) -> Result<Vec<String>, JudgeError> {
        let mut state = self.state.lock().unwrap();
        state.submit_calls += 1;

        if self.fail_submit {
            return Err(JudgeError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }

        let mut statuses = state.outcomes.pop_front().unwrap_or_default();
        statuses.resize(submissions.len(), JudgeStatus::ACCEPTED_ID);

        let batch = state.batches.len();
        state.batches.push(Batch {
            requests: submissions.to_vec(),
            statuses,
            fetches: 0,
        });

        let count = submissions.len().saturating_sub(self.dropped_tokens);
        Ok((0..count).map(|i| format!("b{}-{}", batch, i)).collect())
    }

    async fn fetch_batch(&self, tokens: &[String]) -> Result<Vec<SubmissionResult>, JudgeError> {
        let mut state = self.state.lock().unwrap();
        state.fetch_calls += 1;

        let batch_idx = tokens
            .first()
            .and_then(|t| parse_token(t))
            .map(|(b, _)| b)
            .ok_or_else(|| JudgeError::MalformedResponse("unknown token".into()))?;
        let batch = state
            .batches
            .get_mut(batch_idx)
            .ok_or_else(|| JudgeError::MalformedResponse("unknown batch".into()))?;

        let still_pending = batch.fetches < self.pending_rounds;
        batch.fetches = batch.fetches.saturating_add(1);
        let last = tokens.len().saturating_sub(1);

        tokens
            .iter()
            .enumerate()
            .map(|(pos, token)| {
                let (_, idx) = parse_token(token)
                    .ok_or_else(|| JudgeError::MalformedResponse(token.clone()))?;
                let id = if still_pending && pos == last {
                    2
                } else {
                    batch.statuses[idx]
                };
                let mut result = result_with_status(id);
                result.token = Some(token.clone());
                Ok(result)
            })
            .collect()
    }
}

/// Mailer that keeps every message instead of sending it
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, MailContent)>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<(String, MailContent)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, content: MailContent) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((to.to_string(), content));
        Ok(())
    }
}
