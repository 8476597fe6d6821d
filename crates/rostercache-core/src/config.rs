//! Configuration for the caching layer and the upstream record store.
//!
//! All knobs are environment-driven with sensible defaults; a `.env` file is
//! honored when present. Use `ROSTERCACHE_*` variables to override.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Bulk snapshot TTL in seconds.
/// Two minutes keeps cross-entity joins fresh without hammering the
/// rate-limited upstream on every request.
const DEFAULT_BULK_TTL_SECS: u64 = 120;

/// Enriched result TTL in seconds.
const DEFAULT_RESULT_TTL_SECS: u64 = 300;

/// TTL for empty results in seconds.
/// Empty views are cheap to recompute wrong but expensive to hammer
/// upstream for, so they live longer than populated ones.
const DEFAULT_EMPTY_RESULT_TTL_SECS: u64 = 600;

/// Upper bound on a single record store request, in seconds.
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// A stale bulk snapshot may be served after a failed refresh until it is
/// this many TTLs old; past the ceiling the failure surfaces instead.
const DEFAULT_HARD_STALENESS_FACTOR: u32 = 10;

/// Result entry count that triggers an opportunistic prune of expired
/// entries on insert.
const DEFAULT_MAX_RESULT_ENTRIES: usize = 100;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub bulk_ttl: Duration,
    pub result_ttl: Duration,
    pub empty_result_ttl: Duration,
    pub fetch_timeout: Duration,
    pub hard_staleness_factor: u32,
    pub max_result_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            bulk_ttl: Duration::from_secs(DEFAULT_BULK_TTL_SECS),
            result_ttl: Duration::from_secs(DEFAULT_RESULT_TTL_SECS),
            empty_result_ttl: Duration::from_secs(DEFAULT_EMPTY_RESULT_TTL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            hard_staleness_factor: DEFAULT_HARD_STALENESS_FACTOR,
            max_result_entries: DEFAULT_MAX_RESULT_ENTRIES,
        }
    }
}

impl CacheConfig {
    /// Build a config from `ROSTERCACHE_*` environment variables, loading a
    /// `.env` file first if one exists. Unset variables keep their defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        if let Some(secs) = env_u64("ROSTERCACHE_BULK_TTL_SECS") {
            config.bulk_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("ROSTERCACHE_RESULT_TTL_SECS") {
            config.result_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("ROSTERCACHE_EMPTY_RESULT_TTL_SECS") {
            config.empty_result_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("ROSTERCACHE_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(factor) = env_u64("ROSTERCACHE_HARD_STALENESS_FACTOR") {
            config.hard_staleness_factor = factor as u32;
        }
        if let Some(max) = env_u64("ROSTERCACHE_MAX_RESULT_ENTRIES") {
            config.max_result_entries = max as usize;
        }
        config
    }
}

/// Connection parameters for the upstream record store API.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub base_url: String,
    pub api_key: String,
}

impl StoreConfig {
    /// Read `ROSTERCACHE_API_BASE` and `ROSTERCACHE_API_KEY`, loading `.env`
    /// first if one exists. Both are required.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let base_url = env::var("ROSTERCACHE_API_BASE")
            .context("ROSTERCACHE_API_BASE is not set")?;
        let api_key = env::var("ROSTERCACHE_API_KEY")
            .context("ROSTERCACHE_API_KEY is not set")?;
        Ok(Self { base_url, api_key })
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Ignoring unparsable config override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = CacheConfig::default();
        assert_eq!(config.bulk_ttl, Duration::from_secs(120));
        assert!(config.empty_result_ttl > config.result_ttl);
        assert_eq!(config.hard_staleness_factor, 10);
    }

    #[test]
    fn env_u64_rejects_garbage() {
        env::set_var("ROSTERCACHE_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_u64("ROSTERCACHE_TEST_GARBAGE"), None);
        env::set_var("ROSTERCACHE_TEST_GARBAGE", "42");
        assert_eq!(env_u64("ROSTERCACHE_TEST_GARBAGE"), Some(42));
        env::remove_var("ROSTERCACHE_TEST_GARBAGE");
    }
}
