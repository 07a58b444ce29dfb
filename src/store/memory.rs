//! In-process store

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    NewUser, Problem, ProblemDraft, ProblemFilter, ProblemStore, StoreError, StoreResult, User,
    UserStore,
};

#[derive(Debug, Default)]
struct Inner {
    problems: HashMap<String, Problem>,
    /// Problem ids in creation order
    problem_order: Vec<String>,
    users: HashMap<String, User>,
    user_by_email: HashMap<String, String>,
    user_by_username: HashMap<String, String>,
    verifications: HashMap<String, (String, Instant)>,
    sessions: HashMap<String, (String, Instant)>,
}

/// Store kept entirely in memory; contents are lost on shutdown
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Longest lifetime an expiring entry can be given
const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

fn expires_at(ttl: Duration) -> Instant {
    Instant::now() + ttl.min(MAX_TTL)
}

/// Drop entries that can no longer be used
fn prune(entries: &mut HashMap<String, (String, Instant)>) {
    let now = Instant::now();
    entries.retain(|_, (_, expires_at)| *expires_at > now);
}

fn live(entry: Option<&(String, Instant)>) -> Option<String> {
    entry
        .filter(|(_, expires_at)| *expires_at > Instant::now())
        .map(|(user_id, _)| user_id.clone())
}

#[async_trait]
impl ProblemStore for MemoryStore {
    async fn create_problem(&self, owner_id: &str, draft: ProblemDraft) -> StoreResult<Problem> {
        let problem = Problem::new(owner_id, draft);
        let mut inner = self.inner.write().await;
        inner.problem_order.push(problem.id.clone());
        inner.problems.insert(problem.id.clone(), problem.clone());
        Ok(problem)
    }

    async fn get_problem(&self, id: &str) -> StoreResult<Option<Problem>> {
        Ok(self.inner.read().await.problems.get(id).cloned())
    }

    async fn list_problems(&self, filter: &ProblemFilter) -> StoreResult<Vec<Problem>> {
        let inner = self.inner.read().await;
        Ok(inner
            .problem_order
            .iter()
            .filter_map(|id| inner.problems.get(id))
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn update_problem(&self, id: &str, draft: ProblemDraft) -> StoreResult<Option<Problem>> {
        let mut inner = self.inner.write().await;
        Ok(inner.problems.get_mut(id).map(|problem| {
            problem.draft = draft;
            problem.updated_at = Utc::now();
            problem.clone()
        }))
    }

    async fn delete_problem(&self, id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.problems.remove(id).is_none() {
            return Ok(false);
        }
        inner.problem_order.retain(|p| p != id);
        Ok(true)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        if inner
            .user_by_email
            .contains_key(&new_user.email.to_lowercase())
        {
            return Err(StoreError::Conflict(format!(
                "User with email {} already exists",
                new_user.email
            )));
        }

        let user = User::new(new_user);
        inner
            .user_by_email
            .insert(user.email.to_lowercase(), user.id.clone());
        inner
            .user_by_username
            .insert(user.username.clone(), user.id.clone());
        inner.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(id).cloned())
    }

    async fn find_user_by_login(
        &self,
        email: Option<&str>,
        username: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        let id = email
            .and_then(|e| inner.user_by_email.get(&e.to_lowercase()))
            .or_else(|| username.and_then(|u| inner.user_by_username.get(u)));
        Ok(id.and_then(|id| inner.users.get(id)).cloned())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn save_verification_token(
        &self,
        token_hash: &str,
        user_id: &str,
        ttl: Duration,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        prune(&mut inner.verifications);
        inner
            .verifications
            .insert(token_hash.to_string(), (user_id.to_string(), expires_at(ttl)));
        Ok(())
    }

    async fn take_verification_token(&self, token_hash: &str) -> StoreResult<Option<String>> {
        let mut inner = self.inner.write().await;
        let entry = inner.verifications.remove(token_hash);
        Ok(live(entry.as_ref()))
    }

    async fn create_session(&self, token: &str, user_id: &str, ttl: Duration) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        prune(&mut inner.sessions);
        inner
            .sessions
            .insert(token.to_string(), (user_id.to_string(), expires_at(ttl)));
        Ok(())
    }

    async fn session_user(&self, token: &str) -> StoreResult<Option<String>> {
        Ok(live(self.inner.read().await.sessions.get(token)))
    }

    async fn delete_session(&self, token: &str) -> StoreResult<()> {
        self.inner.write().await.sessions.remove(token);
        Ok(())
    }
}
