//! Persistence layer
//!
//! Problems and users live behind two async traits so handlers and the
//! validation flow receive an injected handle rather than a global client:
//! - `RedisStore` for deployments
//! - `MemoryStore` for tests and single-process runs

pub mod memory;
pub mod redis;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),

    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Testcase {
    pub input: String,
    pub output: String,
}

/// Problem payload as submitted by an admin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDraft {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub examples: serde_json::Value,
    #[serde(default)]
    pub constraints: String,
    pub testcases: Vec<Testcase>,
    #[serde(default)]
    pub code_snippets: BTreeMap<String, String>,
    pub reference_solutions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    #[serde(flatten)]
    pub draft: ProblemDraft,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Problem {
    pub fn new(owner_id: &str, draft: ProblemDraft) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            draft,
            user_id: owner_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProblemFilter {
    pub difficulty: Option<Difficulty>,
    pub tag: Option<String>,
}

impl ProblemFilter {
    pub fn matches(&self, problem: &Problem) -> bool {
        if let Some(difficulty) = self.difficulty {
            if problem.draft.difficulty != difficulty {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !problem.draft.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub fullname: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub email_verified: bool,
    pub last_verification_sent: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub fullname: Option<String>,
    pub password_hash: String,
    pub role: Role,
}

impl User {
    pub fn new(new_user: NewUser) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: new_user.email,
            username: new_user.username,
            fullname: new_user.fullname,
            password_hash: new_user.password_hash,
            role: new_user.role,
            email_verified: false,
            last_verification_sent: None,
            created_at: Utc::now(),
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            fullname: self.fullname.clone(),
            role: self.role,
            email_verified: self.email_verified,
        }
    }
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub username: String,
    pub fullname: Option<String>,
    pub role: Role,
    pub email_verified: bool,
}

#[async_trait]
pub trait ProblemStore: Send + Sync {
    async fn create_problem(&self, owner_id: &str, draft: ProblemDraft) -> StoreResult<Problem>;

    async fn get_problem(&self, id: &str) -> StoreResult<Option<Problem>>;

    /// Problems in creation order
    async fn list_problems(&self, filter: &ProblemFilter) -> StoreResult<Vec<Problem>>;

    async fn update_problem(&self, id: &str, draft: ProblemDraft) -> StoreResult<Option<Problem>>;

    /// Returns false if there was nothing to delete
    async fn delete_problem(&self, id: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `StoreError::Conflict` if the email is taken
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User>;

    async fn get_user(&self, id: &str) -> StoreResult<Option<User>>;

    /// Look a user up by email, falling back to username
    async fn find_user_by_login(
        &self,
        email: Option<&str>,
        username: Option<&str>,
    ) -> StoreResult<Option<User>>;

    async fn update_user(&self, user: &User) -> StoreResult<()>;

    async fn save_verification_token(
        &self,
        token_hash: &str,
        user_id: &str,
        ttl: Duration,
    ) -> StoreResult<()>;

    /// Consume a verification token, returning its user id if it was live
    async fn take_verification_token(&self, token_hash: &str) -> StoreResult<Option<String>>;

    async fn create_session(&self, token: &str, user_id: &str, ttl: Duration) -> StoreResult<()>;

    async fn session_user(&self, token: &str) -> StoreResult<Option<String>>;

    async fn delete_session(&self, token: &str) -> StoreResult<()>;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn draft(title: &str, difficulty: Difficulty, tags: &[&str]) -> ProblemDraft {
        ProblemDraft {
            title: title.to_string(),
            description: format!("{} description", title),
            difficulty,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            examples: serde_json::json!({}),
            constraints: String::new(),
            testcases: vec![Testcase {
                input: "1 2".into(),
                output: "3".into(),
            }],
            code_snippets: BTreeMap::new(),
            reference_solutions: BTreeMap::from([(
                "PYTHON".to_string(),
                "print(sum(map(int, input().split())))".to_string(),
            )]),
        }
    }

    pub fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            fullname: None,
            password_hash: "hash".to_string(),
            role: Role::User,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::draft;
    use super::*;

    #[test]
    fn test_problem_serializes_camel_case_flat() {
        let problem = Problem::new("owner", draft("Sum", Difficulty::Easy, &["math"]));
        let json = serde_json::to_value(&problem).unwrap();

        assert_eq!(json["title"], "Sum");
        assert_eq!(json["difficulty"], "EASY");
        assert_eq!(json["userId"], "owner");
        assert!(json["referenceSolutions"]["PYTHON"].is_string());
        assert!(json.get("draft").is_none());
    }

    #[test]
    fn test_filter_matches() {
        let problem = Problem::new("owner", draft("Sum", Difficulty::Easy, &["Math"]));

        assert!(ProblemFilter::default().matches(&problem));
        assert!(ProblemFilter {
            difficulty: Some(Difficulty::Easy),
            tag: Some("math".into()),
        }
        .matches(&problem));
        assert!(!ProblemFilter {
            difficulty: Some(Difficulty::Hard),
            tag: None,
        }
        .matches(&problem));
        assert!(!ProblemFilter {
            difficulty: None,
            tag: Some("graphs".into()),
        }
        .matches(&problem));
    }

    #[test]
    fn test_profile_hides_password_hash() {
        let user = User::new(fixtures::new_user("a@b.io", "alice"));
        let json = serde_json::to_value(user.profile()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "USER");
    }
}
