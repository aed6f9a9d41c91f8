//! Publisher configuration loaded from the environment.

use std::time::Duration;

use tracing::warn;

use crate::jobs::RetryPolicy;

pub const DEFAULT_BATCH_SIZE: usize = 20;

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Address the HTTP surface binds to.
    pub bind_addr: String,
    /// Products per batch when a job is scheduled without an explicit size.
    pub default_batch_size: usize,
    /// How often the background worker looks for due jobs.
    pub poll_interval: Duration,
    /// Upper bound for every provider and image HTTP call.
    pub http_timeout: Duration,
    /// Retry policy applied to newly scheduled jobs.
    pub retry_policy: RetryPolicy,
    /// When set, jobs are persisted in Postgres.
    pub database_url: Option<String>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            default_batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: Duration::from_millis(1_000),
            http_timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
            database_url: None,
        }
    }
}

impl PublisherConfig {
    /// Read `STOREFRONT_*` variables and `DATABASE_URL`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_addr = lookup("STOREFRONT_BIND_ADDR").unwrap_or_else(|| {
            warn!(default = %defaults.bind_addr, "STOREFRONT_BIND_ADDR not set, using default");
            defaults.bind_addr.clone()
        });

        let default_batch_size = parse_or(
            &lookup,
            "STOREFRONT_DEFAULT_BATCH_SIZE",
            defaults.default_batch_size,
        )
        .max(1);

        let poll_interval = Duration::from_millis(parse_or(
            &lookup,
            "STOREFRONT_POLL_INTERVAL_MS",
            defaults.poll_interval.as_millis() as u64,
        ));

        let http_timeout = Duration::from_secs(parse_or(
            &lookup,
            "STOREFRONT_HTTP_TIMEOUT_SECS",
            defaults.http_timeout.as_secs(),
        ));

        let retry_policy = RetryPolicy {
            max_attempts: parse_or(
                &lookup,
                "STOREFRONT_MAX_ATTEMPTS",
                defaults.retry_policy.max_attempts,
            ),
            ..defaults.retry_policy
        };

        Self {
            bind_addr,
            default_batch_size,
            poll_interval,
            http_timeout,
            retry_policy,
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.default_batch_size = size.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, default = %default, "invalid value, using default");
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = PublisherConfig::from_lookup(lookup(&[]));
        assert_eq!(config.default_batch_size, 20);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn values_are_read_and_bad_values_ignored() {
        let config = PublisherConfig::from_lookup(lookup(&[
            ("STOREFRONT_DEFAULT_BATCH_SIZE", "50"),
            ("STOREFRONT_HTTP_TIMEOUT_SECS", "soon"),
            ("STOREFRONT_MAX_ATTEMPTS", "2"),
            ("DATABASE_URL", "postgres://localhost/storefront"),
        ]));

        assert_eq!(config.default_batch_size, 50);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.retry_policy.max_attempts, 2);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/storefront")
        );
    }

    #[test]
    fn batch_size_is_at_least_one() {
        let config = PublisherConfig::from_lookup(lookup(&[("STOREFRONT_DEFAULT_BATCH_SIZE", "0")]));
        assert_eq!(config.default_batch_size, 1);
        assert_eq!(PublisherConfig::default().with_batch_size(0).default_batch_size, 1);
    }
}
