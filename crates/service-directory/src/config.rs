//! Runtime configuration for the service directory.

use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Directory tuning, read from the environment.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Lifetime written into `expires_at` at sync.
    pub cache_ttl: Duration,
    /// Confidence floor applied by request resolution.
    pub min_confidence: f64,
    /// Default result cap for queries.
    pub max_results: usize,
    /// Nodes synced in parallel by a full sync.
    pub sync_concurrency: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(24 * 3600),
            min_confidence: 0.5,
            max_results: 50,
            sync_concurrency: 4,
        }
    }
}

impl DirectoryConfig {
    /// Load from environment variables. Unparseable values fall back to the
    /// defaults with a warning.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let ttl_secs = env_or("DIRECTORY_CACHE_TTL_SECS", defaults.cache_ttl.as_secs(), |v: &u64| *v > 0);
        let min_confidence = env_or("DIRECTORY_MIN_CONFIDENCE", defaults.min_confidence, |v: &f64| {
            (0.0..=1.0).contains(v)
        });
        let max_results = env_or("DIRECTORY_MAX_RESULTS", defaults.max_results, |v: &usize| *v > 0);
        let sync_concurrency = env_or("DIRECTORY_SYNC_CONCURRENCY", defaults.sync_concurrency, |v: &usize| {
            *v > 0
        });

        Self {
            cache_ttl: Duration::from_secs(ttl_secs),
            min_confidence,
            max_results,
            sync_concurrency,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// TTL as a chrono duration for timestamp arithmetic.
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.cache_ttl).unwrap_or_else(|_| chrono::Duration::days(1))
    }
}

fn env_or<T>(name: &str, default: T, valid: impl Fn(&T) -> bool) -> T
where
    T: FromStr + std::fmt::Display,
{
    let Ok(raw) = std::env::var(name) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            warn!(variable = name, value = %raw, default = %default, "Invalid value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DirectoryConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(86400));
        assert_eq!(config.min_confidence, 0.5);
        assert_eq!(config.max_results, 50);
        assert_eq!(config.ttl(), chrono::Duration::hours(24));
    }

    #[test]
    fn test_env_or_rejects_invalid() {
        std::env::set_var("DIRECTORY_TEST_CONFIDENCE", "1.7");
        assert_eq!(env_or("DIRECTORY_TEST_CONFIDENCE", 0.5, |v: &f64| (0.0..=1.0).contains(v)), 0.5);
        std::env::set_var("DIRECTORY_TEST_CONFIDENCE", "0.8");
        assert_eq!(env_or("DIRECTORY_TEST_CONFIDENCE", 0.5, |v: &f64| (0.0..=1.0).contains(v)), 0.8);
        std::env::set_var("DIRECTORY_TEST_CONFIDENCE", "high");
        assert_eq!(env_or("DIRECTORY_TEST_CONFIDENCE", 0.5, |_: &f64| true), 0.5);
        std::env::remove_var("DIRECTORY_TEST_CONFIDENCE");
    }
}
