//! Judger module for running code through the judge service
//!
//! Submits a batch of submissions, polls the judge service until every
//! submission has finished, and folds the per-testcase results into a verdict.

use std::time::Duration;

use tracing::{debug, info};

use crate::core::Verdict;
use crate::judge0::{JudgeClient, JudgeError, SubmissionRequest, SubmissionResult};

/// How often and how long to poll for batch results
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 60,
        }
    }
}

/// Build one submission per testcase for a single piece of source code
pub fn build_submissions<'a, I>(source_code: &str, language_id: u32, testcases: I) -> Vec<SubmissionRequest>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    testcases
        .into_iter()
        .map(|(input, output)| SubmissionRequest {
            source_code: source_code.to_string(),
            language_id,
            stdin: input.to_string(),
            expected_output: output.to_string(),
        })
        .collect()
}

/// Submit a batch and return one token per request, in request order
pub async fn submit_batch(
    judge: &dyn JudgeClient,
    requests: &[SubmissionRequest],
) -> Result<Vec<String>, JudgeError> {
    if requests.is_empty() {
        return Ok(Vec::new());
    }

    let tokens = judge.submit_batch(requests).await?;
    if tokens.len() != requests.len() {
        return Err(JudgeError::MalformedResponse(format!(
            "expected {} tokens, got {}",
            requests.len(),
            tokens.len()
        )));
    }

    debug!("Submitted batch: {} submissions", tokens.len());
    Ok(tokens)
}

/// Poll until every submission is in a terminal state.
///
/// Each round queries all tokens at once; results are only returned when the
/// whole batch is done. Gives up with `JudgeError::PollTimeout` after
/// `policy.max_attempts` rounds.
pub async fn poll_results(
    judge: &dyn JudgeClient,
    tokens: &[String],
    policy: &PollPolicy,
) -> Result<Vec<SubmissionResult>, JudgeError> {
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let results = judge.fetch_batch(tokens).await?;
        if results.len() != tokens.len() {
            return Err(JudgeError::MalformedResponse(format!(
                "expected {} results, got {}",
                tokens.len(),
                results.len()
            )));
        }

        let pending = results
            .iter()
            .filter(|r| !r.judge_status().is_terminal())
            .count();
        if pending == 0 {
            debug!("Batch finished after {} poll(s)", attempt);
            return Ok(results);
        }

        debug!(
            "Poll {}/{}: {} of {} submissions pending",
            attempt,
            max_attempts,
            pending,
            tokens.len()
        );

        if attempt < max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(JudgeError::PollTimeout {
        attempts: max_attempts,
    })
}

/// Submit a batch and wait for all of its results
pub async fn run_batch(
    judge: &dyn JudgeClient,
    requests: &[SubmissionRequest],
    policy: &PollPolicy,
) -> Result<Vec<SubmissionResult>, JudgeError> {
    let tokens = submit_batch(judge, requests).await?;
    poll_results(judge, &tokens, policy).await
}

/// Decide accept/reject for one language; the first non-accepted result wins
pub fn aggregate_verdict(language: &str, results: &[SubmissionResult]) -> Verdict {
    for (idx, result) in results.iter().enumerate() {
        info!(
            "Testcase {} and language {}: {}",
            idx + 1,
            language,
            result.status.description
        );

        if !result.judge_status().is_accepted() {
            return Verdict::rejected(language, idx + 1, result.status.description.clone());
        }
    }

    Verdict::accepted(language)
}
