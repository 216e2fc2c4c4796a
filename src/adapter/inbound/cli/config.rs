//! Handler for the `config` command group.

use std::path::Path;

use serde_json::json;

use super::output;
use crate::infrastructure::config::settings::Config;

/// Execute `config validate` for an already loaded configuration.
pub fn execute_validate(path: Option<&Path>, config: &Config) {
    let source = path.map_or_else(|| "(defaults)".to_string(), |p| p.display().to_string());

    if output::is_json() {
        output::json_record(
            "config",
            json!({
                "valid": true,
                "path": source,
                "base_url": config.api.base_url,
                "stale_time_ms": config.cache.stale_time_ms,
                "gc_time_ms": config.cache.gc_time_ms,
                "max_retries": config.retry.max_retries,
                "max_members": config.comparison.max_members,
            }),
        );
        return;
    }

    output::section("Configuration");
    output::success("Configuration is valid");
    output::field("Path", source);
    output::field("API", &config.api.base_url);
    output::field("Token env", &config.api.token_env);
    output::field("Stale time", format!("{} ms", config.cache.stale_time_ms));
    output::field("GC time", format!("{} ms", config.cache.gc_time_ms));
    output::field("Retries", config.retry.max_retries);
    output::field("Max members", config.comparison.max_members);
}
