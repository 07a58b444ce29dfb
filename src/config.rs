//! Service configuration
//!
//! Loaded from environment variables (after `.env`, if present) with defaults
//! suitable for local development.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::judge0::Judge0Settings;
use crate::judger::PollPolicy;

/// Upper bound for SESSION_TTL_SECS (one year)
const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("Unknown STORE_BACKEND: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to (default: 0.0.0.0:8080)
    pub bind_addr: String,
    /// Public base URL used in emailed links
    pub base_url: String,
    pub judge0: Judge0Settings,
    pub poll_policy: PollPolicy,
    pub store_backend: StoreBackend,
    pub redis_url: String,
    /// Session lifetime (default: 24h)
    pub session_ttl: Duration,
    /// Emails that are given the ADMIN role when they register
    pub admin_emails: Vec<String>,
    /// Optional language table overriding the bundled one
    pub languages_config: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".into(),
            base_url: "http://localhost:8080".into(),
            judge0: Judge0Settings {
                base_url: "http://localhost:2358".into(),
                api_key: None,
                api_host: None,
                timeout: Duration::from_secs(10),
            },
            poll_policy: PollPolicy::default(),
            store_backend: StoreBackend::Redis,
            redis_url: "redis://localhost:6379".into(),
            session_ttl: Duration::from_secs(24 * 60 * 60),
            admin_emails: Vec::new(),
            languages_config: None,
        }
    }
}

impl Config {
    /// Build config from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let parse = |key: &str| -> anyhow::Result<Option<u64>> {
            var(key)
                .map(|v| {
                    v.trim()
                        .parse::<u64>()
                        .with_context(|| format!("Invalid {}: {}", key, v))
                })
                .transpose()
        };

        let judge0 = Judge0Settings {
            base_url: var("JUDGE0_URL").unwrap_or(defaults.judge0.base_url),
            api_key: var("JUDGE0_API_KEY"),
            api_host: var("JUDGE0_API_HOST"),
            timeout: parse("JUDGE0_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.judge0.timeout),
        };

        let poll_policy = PollPolicy {
            interval: parse("JUDGE0_POLL_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_policy.interval),
            max_attempts: match parse("JUDGE0_MAX_POLL_ATTEMPTS")? {
                Some(n) => u32::try_from(n).context("JUDGE0_MAX_POLL_ATTEMPTS is too large")?,
                None => defaults.poll_policy.max_attempts,
            },
        };

        let store_backend = match var("STORE_BACKEND") {
            Some(v) => v.parse()?,
            None => defaults.store_backend,
        };

        let session_ttl = match parse("SESSION_TTL_SECS")? {
            Some(secs) => {
                anyhow::ensure!(
                    secs <= MAX_SESSION_TTL_SECS,
                    "SESSION_TTL_SECS must be at most {}",
                    MAX_SESSION_TTL_SECS
                );
                Duration::from_secs(secs)
            }
            None => defaults.session_ttl,
        };

        let admin_emails = var("ADMIN_EMAILS")
            .map(|v| {
                v.split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            base_url: var("BASE_URL").unwrap_or(defaults.base_url),
            judge0,
            poll_policy,
            store_backend,
            redis_url: var("REDIS_URL").unwrap_or(defaults.redis_url),
            session_ttl,
            admin_emails,
            languages_config: var("LANGUAGES_CONFIG").map(PathBuf::from),
        })
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|e| e.eq_ignore_ascii_case(email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.poll_policy.interval, Duration::from_secs(1));
        assert_eq!(config.poll_policy.max_attempts, 60);
        assert_eq!(config.store_backend, StoreBackend::Redis);
        assert!(config.judge0.api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("JUDGE0_URL", "https://judge0-ce.p.rapidapi.com"),
            ("JUDGE0_API_KEY", "secret"),
            ("JUDGE0_POLL_INTERVAL_MS", "250"),
            ("JUDGE0_MAX_POLL_ATTEMPTS", "12"),
            ("STORE_BACKEND", "Memory"),
            ("ADMIN_EMAILS", "Root@Example.com, ops@example.com,"),
        ])
        .unwrap();

        assert_eq!(config.judge0.base_url, "https://judge0-ce.p.rapidapi.com");
        assert_eq!(config.judge0.api_key.as_deref(), Some("secret"));
        assert_eq!(config.poll_policy.interval, Duration::from_millis(250));
        assert_eq!(config.poll_policy.max_attempts, 12);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.admin_emails, vec!["root@example.com", "ops@example.com"]);
        assert!(config.is_admin_email("ROOT@example.com"));
        assert!(!config.is_admin_email("user@example.com"));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = config_from(&[("REDIS_URL", "  "), ("JUDGE0_API_KEY", "")]).unwrap();
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert!(config.judge0.api_key.is_none());
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(config_from(&[("JUDGE0_TIMEOUT_SECS", "ten")]).is_err());
        assert!(config_from(&[("STORE_BACKEND", "postgres")]).is_err());
        assert!(config_from(&[("SESSION_TTL_SECS", "18446744073709551615")]).is_err());
    }

    #[test]
    fn test_session_ttl_bound() {
        let config = config_from(&[("SESSION_TTL_SECS", "31536000")]).unwrap();
        assert_eq!(config.session_ttl, Duration::from_secs(31_536_000));
        assert!(config_from(&[("SESSION_TTL_SECS", "31536001")]).is_err());
    }
}
