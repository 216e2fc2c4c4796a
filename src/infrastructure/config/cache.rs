//! Query cache timing configuration.
//!
//! Staleness and garbage-collection windows are configured globally with
//! optional per-resource overrides:
//!
//! ```toml
//! [cache]
//! stale_time_ms = 30000
//! gc_time_ms = 300000
//!
//! [cache.resources.price_history]
//! stale_time_ms = 300000
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

/// Staleness and eviction windows for one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    /// How long a fetched value counts as fresh.
    pub stale_time: Duration,
    /// How long an unused entry is kept before eviction.
    pub gc_time: Duration,
}

/// Per-resource override; unset fields fall back to the global values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceCacheConfig {
    pub stale_time_ms: Option<u64>,
    pub gc_time_ms: Option<u64>,
}

/// Query cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Default freshness window (milliseconds).
    #[serde(default = "default_stale_time_ms")]
    pub stale_time_ms: u64,
    /// Default idle time before eviction (milliseconds).
    #[serde(default = "default_gc_time_ms")]
    pub gc_time_ms: u64,
    /// Interval of the background eviction sweep (milliseconds).
    #[serde(default = "default_gc_interval_ms")]
    pub gc_interval_ms: u64,
    /// Capacity of the cache event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Overrides keyed by resource name (`set_list`, `set_detail`,
    /// `price_history`, `set_prices`).
    #[serde(default = "default_resources")]
    pub resources: HashMap<String, ResourceCacheConfig>,
}

const fn default_stale_time_ms() -> u64 {
    30_000
}

const fn default_gc_time_ms() -> u64 {
    300_000
}

const fn default_gc_interval_ms() -> u64 {
    60_000
}

const fn default_event_capacity() -> usize {
    256
}

fn default_resources() -> HashMap<String, ResourceCacheConfig> {
    // Daily bars change slowly relative to user-owned sets.
    let slow = ResourceCacheConfig {
        stale_time_ms: Some(300_000),
        gc_time_ms: Some(1_800_000),
    };
    HashMap::from([
        ("price_history".to_string(), slow.clone()),
        ("set_prices".to_string(), slow),
    ])
}

impl CacheConfig {
    /// Resolve the windows for a resource kind.
    #[must_use]
    pub fn freshness(&self, resource: &str) -> Freshness {
        let over = self.resources.get(resource);
        let stale_ms = over
            .and_then(|o| o.stale_time_ms)
            .unwrap_or(self.stale_time_ms);
        let gc_ms = over.and_then(|o| o.gc_time_ms).unwrap_or(self.gc_time_ms);
        Freshness {
            stale_time: Duration::from_millis(stale_ms),
            gc_time: Duration::from_millis(gc_ms),
        }
    }

    #[must_use]
    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time_ms: default_stale_time_ms(),
            gc_time_ms: default_gc_time_ms(),
            gc_interval_ms: default_gc_interval_ms(),
            event_capacity: default_event_capacity(),
            resources: default_resources(),
        }
    }
}
