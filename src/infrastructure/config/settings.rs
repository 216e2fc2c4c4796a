//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all application settings.
//! Configuration is loaded from a TOML file; the bearer token is read from the
//! environment variable named by `api.token_env`, never from the file.
//!
//! # Example
//!
//! ```no_run
//! use comparesync::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use super::api::ApiConfig;
use super::cache::CacheConfig;
use super::logging::LoggingConfig;
use super::retry::RetryConfig;
use crate::domain::MembershipPolicy;
use crate::error::{ConfigError, Result};

/// Comparison-set rules.
#[derive(Debug, Clone, Deserialize)]
pub struct ComparisonConfig {
    /// Maximum number of companies in one set.
    #[serde(default = "default_max_members")]
    pub max_members: usize,
}

const fn default_max_members() -> usize {
    crate::domain::comparison::DEFAULT_MAX_MEMBERS
}

impl ComparisonConfig {
    #[must_use]
    pub fn policy(&self) -> MembershipPolicy {
        MembershipPolicy::new(self.max_members)
    }
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            max_members: default_max_members(),
        }
    }
}

/// Main application configuration.
///
/// Every section is optional; missing sections take their defaults. Load
/// from a file with [`Config::load`] or parse directly with
/// [`Config::parse_toml`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Backend connection settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Staleness and eviction windows.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Fetch retry and backoff.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Comparison-set rules.
    #[serde(default)]
    pub comparison: ComparisonConfig,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Initialize tracing from the `[logging]` section.
    pub fn init_logging(&self) {
        self.logging.init();
    }

    /// Validate configuration values.
    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "base_url" }.into());
        }
        if self.api.timeout_ms == 0 {
            return Err(invalid("timeout_ms", "must be greater than 0"));
        }
        if self.api.connect_timeout_ms == 0 {
            return Err(invalid("connect_timeout_ms", "must be greater than 0"));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(invalid("format", "must be 'pretty' or 'json'"));
        }
        if self.cache.gc_interval_ms == 0 {
            return Err(invalid("gc_interval_ms", "must be greater than 0"));
        }
        if self.cache.event_capacity == 0 {
            return Err(invalid("event_capacity", "must be greater than 0"));
        }
        for (resource, over) in &self.cache.resources {
            if !matches!(
                resource.as_str(),
                "set_list" | "set_detail" | "price_history" | "set_prices"
            ) {
                return Err(ConfigError::InvalidValue {
                    field: "resources",
                    reason: format!("unknown resource '{resource}'"),
                }
                .into());
            }
            if over.gc_time_ms == Some(0) {
                return Err(invalid("gc_time_ms", "must be greater than 0"));
            }
        }
        if self.cache.gc_time_ms == 0 {
            return Err(invalid("gc_time_ms", "must be greater than 0"));
        }
        if self.retry.backoff_multiplier < 1.0 || !self.retry.backoff_multiplier.is_finite() {
            return Err(invalid("backoff_multiplier", "must be at least 1.0"));
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            return Err(invalid("max_delay_ms", "must be at least initial_delay_ms"));
        }
        if self.comparison.max_members == 0 {
            return Err(invalid("max_members", "must be greater than 0"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::parse_toml("").unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8080/api");
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.comparison.max_members, 5);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn parses_sections() {
        let toml = r#"
[api]
base_url = "https://dash.example.com/api"
timeout_ms = 2000

[cache]
stale_time_ms = 0

[cache.resources.set_detail]
gc_time_ms = 1000

[retry]
max_retries = 5
jitter = false

[comparison]
max_members = 4
"#;
        let config = Config::parse_toml(toml).unwrap();
        assert_eq!(config.api.timeout_ms, 2000);
        assert_eq!(config.cache.stale_time_ms, 0);
        assert_eq!(config.retry.max_retries, 5);
        assert!(!config.retry.jitter);
        assert_eq!(config.comparison.policy().max_members, 4);
        assert_eq!(
            config.cache.freshness("set_detail").gc_time,
            std::time::Duration::from_millis(1000)
        );
    }

    #[test]
    fn rejects_unknown_resource_override() {
        let result = Config::parse_toml("[cache.resources.portfolio]\nstale_time_ms = 1\n");
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidValue {
                field: "resources",
                ..
            }))
        ));
    }

    #[test]
    fn rejects_shrinking_backoff() {
        let result = Config::parse_toml("[retry]\nbackoff_multiplier = 0.5\n");
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidValue {
                field: "backoff_multiplier",
                ..
            }))
        ));
    }
}
