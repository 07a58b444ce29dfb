//! Validator module for problem reference solutions
//!
//! A problem is only stored once every reference solution passes every
//! testcase on the judge service. Languages are checked one at a time; the
//! first unsupported language or failing testcase stops the whole attempt
//! and nothing is written.

use thiserror::Error;
use tracing::{info, warn};

use crate::core::Verdict;
use crate::judge0::{JudgeClient, JudgeError};
use crate::judger::{aggregate_verdict, build_submissions, run_batch, PollPolicy};
use crate::languages::{LanguageConfig, Languages};
use crate::store::{Problem, ProblemDraft, ProblemStore, StoreError};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{language} is not supported. Please use one of the following: {supported}.")]
    UnsupportedLanguage { language: String, supported: String },

    #[error("Testcase {index} failed for language {language}")]
    TestcaseFailed {
        index: usize,
        language: String,
        status: String,
    },

    #[error(transparent)]
    Judge(#[from] JudgeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs reference solutions through the judge and persists validated problems
pub struct ProblemValidator<'a> {
    judge: &'a dyn JudgeClient,
    languages: &'a Languages,
    policy: PollPolicy,
}

impl<'a> ProblemValidator<'a> {
    pub fn new(judge: &'a dyn JudgeClient, languages: &'a Languages, policy: PollPolicy) -> Self {
        Self {
            judge,
            languages,
            policy,
        }
    }

    /// Resolve every reference solution language before anything is submitted
    fn resolve_languages<'d>(
        &self,
        draft: &'d ProblemDraft,
    ) -> Result<Vec<(&'d str, &'d str, &'a LanguageConfig)>, ValidationError> {
        draft
            .reference_solutions
            .iter()
            .map(|(language, source)| {
                self.languages
                    .resolve(language)
                    .map(|config| (language.as_str(), source.as_str(), config))
                    .ok_or_else(|| ValidationError::UnsupportedLanguage {
                        language: language.clone(),
                        supported: self.languages.supported().join(", "),
                    })
            })
            .collect()
    }

    /// Check every reference solution against every testcase.
    ///
    /// Returns one accepted verdict per language, in map order.
    pub async fn validate(&self, draft: &ProblemDraft) -> Result<Vec<Verdict>, ValidationError> {
        let solutions = self.resolve_languages(draft)?;
        let mut verdicts = Vec::with_capacity(solutions.len());

        for (language, source, config) in solutions {
            info!(
                "Validating reference solution: language={}, judge0_id={}, testcases={}",
                language,
                config.judge0_id,
                draft.testcases.len()
            );

            let submissions = build_submissions(
                source,
                config.judge0_id,
                draft
                    .testcases
                    .iter()
                    .map(|tc| (tc.input.as_str(), tc.output.as_str())),
            );
            let results = run_batch(self.judge, &submissions, &self.policy).await?;

            let verdict = aggregate_verdict(language, &results);
            if let Some(index) = verdict.failing_testcase {
                warn!(
                    "Reference solution rejected: language={}, testcase={}, status={}",
                    language,
                    index,
                    verdict.status.as_deref().unwrap_or("")
                );
                return Err(ValidationError::TestcaseFailed {
                    index,
                    language: language.to_string(),
                    status: verdict.status.unwrap_or_default(),
                });
            }

            verdicts.push(verdict);
        }

        Ok(verdicts)
    }

    /// Validate, then create the problem with a single store write
    pub async fn create_problem(
        &self,
        store: &dyn ProblemStore,
        owner_id: &str,
        draft: ProblemDraft,
    ) -> Result<Problem, ValidationError> {
        self.validate(&draft).await?;
        let problem = store.create_problem(owner_id, draft).await?;
        info!("Problem created: id={}, owner={}", problem.id, owner_id);
        Ok(problem)
    }

    /// Validate, then replace an existing problem's payload.
    /// Returns `Ok(None)` if the problem does not exist.
    pub async fn update_problem(
        &self,
        store: &dyn ProblemStore,
        problem_id: &str,
        draft: ProblemDraft,
    ) -> Result<Option<Problem>, ValidationError> {
        self.validate(&draft).await?;
        Ok(store.update_problem(problem_id, draft).await?)
    }
}
