//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.
//! Avoids each test module defining its own slightly-different defaults.

use std::collections::HashMap;

use crate::application::cache::RetryPolicy;
use crate::infrastructure::config::cache::CacheConfig;
use crate::infrastructure::config::retry::RetryConfig;
use crate::infrastructure::config::settings::Config;

/// Three retries with zero delays.
pub fn retry() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        initial_delay_ms: 0,
        max_delay_ms: 0,
        backoff_multiplier: 1.0,
        jitter: false,
    }
}

pub fn retry_policy() -> RetryPolicy {
    RetryPolicy::from_config(&retry())
}

/// Cache config with uniform windows and no per-resource overrides.
pub fn cache(stale_time_ms: u64, gc_time_ms: u64) -> CacheConfig {
    CacheConfig {
        stale_time_ms,
        gc_time_ms,
        gc_interval_ms: 10,
        event_capacity: 1_024,
        resources: HashMap::new(),
    }
}

/// Full config using [`retry`] and long cache windows.
pub fn config() -> Config {
    Config {
        cache: cache(60_000, 600_000),
        retry: retry(),
        ..Config::default()
    }
}
