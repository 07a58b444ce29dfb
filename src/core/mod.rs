pub mod verdict;

pub use verdict::{JudgeStatus, Verdict};
