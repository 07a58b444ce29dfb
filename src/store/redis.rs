//! Redis-backed store
//!
//! Records are stored as JSON strings:
//! - problems under `problem:{id}`, ordered by a sorted set scored by creation time
//! - users under `user:{id}`, with `SET NX` email claims for uniqueness
//! - sessions and verification tokens as expiring keys

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{info, warn};

use super::{
    NewUser, Problem, ProblemDraft, ProblemFilter, ProblemStore, StoreError, StoreResult, User,
    UserStore,
};

/// Redis key constants
pub mod keys {
    /// Problem record key prefix
    pub const PROBLEM_PREFIX: &str = "problem:";

    /// Sorted set of problem ids, scored by creation time (ms)
    pub const PROBLEM_INDEX: &str = "problems:by_created";

    /// User record key prefix
    pub const USER_PREFIX: &str = "user:";

    /// Email -> user id claim key prefix
    pub const USER_EMAIL_PREFIX: &str = "user:email:";

    /// Username -> user id key prefix
    pub const USER_USERNAME_PREFIX: &str = "user:username:";

    /// Hashed verification token -> user id
    pub const VERIFICATION_PREFIX: &str = "auth:verify:";

    /// Session token -> user id
    pub const SESSION_PREFIX: &str = "auth:session:";

    pub fn problem(id: &str) -> String {
        format!("{}{}", PROBLEM_PREFIX, id)
    }

    pub fn user(id: &str) -> String {
        format!("{}{}", USER_PREFIX, id)
    }

    pub fn user_email(email: &str) -> String {
        format!("{}{}", USER_EMAIL_PREFIX, email.to_lowercase())
    }

    pub fn user_username(username: &str) -> String {
        format!("{}{}", USER_USERNAME_PREFIX, username)
    }

    pub fn verification(token_hash: &str) -> String {
        format!("{}{}", VERIFICATION_PREFIX, token_hash)
    }

    pub fn session(token: &str) -> String {
        format!("{}{}", SESSION_PREFIX, token)
    }
}

const MAX_CONNECT_ATTEMPTS: u32 = 10;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Store backed by a Redis server.
///
/// Holds a `ConnectionManager`, which reconnects on its own; each operation
/// works on a cheap clone of it.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;
        let conn = connect_with_retry(client).await?;
        info!("Connected to Redis at {}", redis_url);
        Ok(Self { conn })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let raw: Option<String> = self.conn().get(key).await?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let json = serde_json::to_string(value)?;
        self.conn().set::<_, _, ()>(key, json).await?;
        Ok(())
    }
}

/// Open a connection manager, retrying while Redis is still coming up
async fn connect_with_retry(client: redis::Client) -> Result<ConnectionManager> {
    let mut attempt = 1;
    loop {
        match ConnectionManager::new(client.clone()).await {
            Ok(conn) => return Ok(conn),
            Err(e) if attempt < MAX_CONNECT_ATTEMPTS => {
                warn!(
                    "Failed to connect to Redis (attempt {}/{}): {}. Retrying in {}s...",
                    attempt,
                    MAX_CONNECT_ATTEMPTS,
                    e,
                    CONNECT_RETRY_DELAY.as_secs()
                );
                attempt += 1;
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
            Err(e) => return Err(e).context("Giving up connecting to Redis"),
        }
    }
}

/// `SET key value XX`: only overwrites a key that still exists
fn overwrite_cmd(key: &str, json: &str) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(json).arg("XX");
    cmd
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl ProblemStore for RedisStore {
    async fn create_problem(&self, owner_id: &str, draft: ProblemDraft) -> StoreResult<Problem> {
        let problem = Problem::new(owner_id, draft);
        let json = serde_json::to_string(&problem)?;

        let mut conn = self.conn();
        let _: () = redis::pipe()
            .atomic()
            .set(keys::problem(&problem.id), json)
            .ignore()
            .zadd(
                keys::PROBLEM_INDEX,
                &problem.id,
                problem.created_at.timestamp_millis(),
            )
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(problem)
    }

    async fn get_problem(&self, id: &str) -> StoreResult<Option<Problem>> {
        self.get_json(&keys::problem(id)).await
    }

    async fn list_problems(&self, filter: &ProblemFilter) -> StoreResult<Vec<Problem>> {
        let mut conn = self.conn();
        let ids: Vec<String> = conn.zrange(keys::PROBLEM_INDEX, 0, -1).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.get(keys::problem(id));
        }
        let raws: Vec<Option<String>> = pipe.query_async(&mut conn).await?;

        let mut problems = Vec::with_capacity(raws.len());
        for json in raws.into_iter().flatten() {
            let problem: Problem = serde_json::from_str(&json)?;
            if filter.matches(&problem) {
                problems.push(problem);
            }
        }
        Ok(problems)
    }

    async fn update_problem(&self, id: &str, draft: ProblemDraft) -> StoreResult<Option<Problem>> {
        let Some(mut problem) = self.get_problem(id).await? else {
            return Ok(None);
        };

        problem.draft = draft;
        problem.updated_at = Utc::now();
        let json = serde_json::to_string(&problem)?;

        // Deleted in the meantime
        let written: Option<String> = overwrite_cmd(&keys::problem(id), &json)
            .query_async(&mut self.conn())
            .await?;
        if written.is_none() {
            return Ok(None);
        }

        Ok(Some(problem))
    }

    async fn delete_problem(&self, id: &str) -> StoreResult<bool> {
        let mut conn = self.conn();
        let (removed, _): (u32, u32) = redis::pipe()
            .atomic()
            .del(keys::problem(id))
            .zrem(keys::PROBLEM_INDEX, id)
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }
}

#[async_trait]
impl UserStore for RedisStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let user = User::new(new_user);
        let mut conn = self.conn();

        // Claim the email first; SET NX is the uniqueness constraint
        let claimed: Option<String> = redis::cmd("SET")
            .arg(keys::user_email(&user.email))
            .arg(&user.id)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        if claimed.is_none() {
            return Err(StoreError::Conflict(format!(
                "User with email {} already exists",
                user.email
            )));
        }

        let json = serde_json::to_string(&user)?;
        let _: () = redis::pipe()
            .atomic()
            .set(keys::user(&user.id), json)
            .ignore()
            .set(keys::user_username(&user.username), &user.id)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(user)
    }

    async fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        self.get_json(&keys::user(id)).await
    }

    async fn find_user_by_login(
        &self,
        email: Option<&str>,
        username: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let mut conn = self.conn();

        let mut user_id: Option<String> = None;
        if let Some(email) = email {
            user_id = conn.get(keys::user_email(email)).await?;
        }
        if user_id.is_none() {
            if let Some(username) = username {
                user_id = conn.get(keys::user_username(username)).await?;
            }
        }

        match user_id {
            Some(id) => self.get_user(&id).await,
            None => Ok(None),
        }
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        self.set_json(&keys::user(&user.id), user).await
    }

    async fn save_verification_token(
        &self,
        token_hash: &str,
        user_id: &str,
        ttl: Duration,
    ) -> StoreResult<()> {
        self.conn()
            .set_ex::<_, _, ()>(keys::verification(token_hash), user_id, ttl_secs(ttl))
            .await?;
        Ok(())
    }

    async fn take_verification_token(&self, token_hash: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn();
        let user_id: Option<String> = redis::cmd("GETDEL")
            .arg(keys::verification(token_hash))
            .query_async(&mut conn)
            .await?;
        Ok(user_id)
    }

    async fn create_session(&self, token: &str, user_id: &str, ttl: Duration) -> StoreResult<()> {
        self.conn()
            .set_ex::<_, _, ()>(keys::session(token), user_id, ttl_secs(ttl))
            .await?;
        Ok(())
    }

    async fn session_user(&self, token: &str) -> StoreResult<Option<String>> {
        let user_id: Option<String> = self.conn().get(keys::session(token)).await?;
        Ok(user_id)
    }

    async fn delete_session(&self, token: &str) -> StoreResult<()> {
        self.conn().del::<_, ()>(keys::session(token)).await?;
        Ok(())
    }
}
