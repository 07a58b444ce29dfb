use serde::{Deserialize, Serialize};
use std::fmt;

/// Judge0 submission status, keyed by the numeric status id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgeStatus {
    InQueue,
    Processing,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    CompilationError,
    RuntimeErrorSigsegv,
    RuntimeErrorSigxfsz,
    RuntimeErrorSigfpe,
    RuntimeErrorSigabrt,
    RuntimeErrorNzec,
    RuntimeErrorOther,
    InternalError,
    ExecFormatError,
    Unknown(u32),
}

impl JudgeStatus {
    pub const ACCEPTED_ID: u32 = 3;

    pub fn from_id(id: u32) -> Self {
        match id {
            1 => JudgeStatus::InQueue,
            2 => JudgeStatus::Processing,
            3 => JudgeStatus::Accepted,
            4 => JudgeStatus::WrongAnswer,
            5 => JudgeStatus::TimeLimitExceeded,
            6 => JudgeStatus::CompilationError,
            7 => JudgeStatus::RuntimeErrorSigsegv,
            8 => JudgeStatus::RuntimeErrorSigxfsz,
            9 => JudgeStatus::RuntimeErrorSigfpe,
            10 => JudgeStatus::RuntimeErrorSigabrt,
            11 => JudgeStatus::RuntimeErrorNzec,
            12 => JudgeStatus::RuntimeErrorOther,
            13 => JudgeStatus::InternalError,
            14 => JudgeStatus::ExecFormatError,
            other => JudgeStatus::Unknown(other),
        }
    }

    /// Queued and processing are the only non-terminal states
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JudgeStatus::InQueue | JudgeStatus::Processing)
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, JudgeStatus::Accepted)
    }
}

impl fmt::Display for JudgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JudgeStatus::InQueue => "In Queue",
            JudgeStatus::Processing => "Processing",
            JudgeStatus::Accepted => "Accepted",
            JudgeStatus::WrongAnswer => "Wrong Answer",
            JudgeStatus::TimeLimitExceeded => "Time Limit Exceeded",
            JudgeStatus::CompilationError => "Compilation Error",
            JudgeStatus::RuntimeErrorSigsegv => "Runtime Error (SIGSEGV)",
            JudgeStatus::RuntimeErrorSigxfsz => "Runtime Error (SIGXFSZ)",
            JudgeStatus::RuntimeErrorSigfpe => "Runtime Error (SIGFPE)",
            JudgeStatus::RuntimeErrorSigabrt => "Runtime Error (SIGABRT)",
            JudgeStatus::RuntimeErrorNzec => "Runtime Error (NZEC)",
            JudgeStatus::RuntimeErrorOther => "Runtime Error (Other)",
            JudgeStatus::InternalError => "Internal Error",
            JudgeStatus::ExecFormatError => "Exec Format Error",
            JudgeStatus::Unknown(id) => return write!(f, "Unknown status {}", id),
        };
        write!(f, "{}", s)
    }
}

/// Accept/reject decision for one reference solution across all its testcases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub language: String,
    pub passed: bool,
    /// 1-based index of the first failing testcase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failing_testcase: Option<usize>,
    /// Judge0 description of the failing result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Verdict {
    pub fn accepted(language: &str) -> Self {
        Self {
            language: language.to_string(),
            passed: true,
            failing_testcase: None,
            status: None,
        }
    }

    pub fn rejected(language: &str, failing_testcase: usize, status: String) -> Self {
        Self {
            language: language.to_string(),
            passed: false,
            failing_testcase: Some(failing_testcase),
            status: Some(status),
        }
    }
}
