use std::io::Write;
use std::time::Duration;

use comparesync::error::{ConfigError, Error};
use comparesync::infrastructure::config::settings::Config;
use tempfile::NamedTempFile;

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn loads_full_config_from_file() {
    let file = write_temp_config(
        r#"
[api]
base_url = "https://stocks.example.com/api/v1"
token_env = "STOCKS_TOKEN"

[logging]
level = "debug"
format = "json"

[cache]
stale_time_ms = 10000
gc_time_ms = 60000

[cache.resources.price_history]
stale_time_ms = 600000

[retry]
max_retries = 2
initial_delay_ms = 250
max_delay_ms = 1000

[comparison]
max_members = 8
"#,
    );

    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.api.token_env, "STOCKS_TOKEN");
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.retry.max_retries, 2);
    assert_eq!(config.comparison.policy().max_members, 8);

    let prices = config.cache.freshness("price_history");
    assert_eq!(prices.stale_time, Duration::from_secs(600));
    assert_eq!(prices.gc_time, Duration::from_secs(60));
    let sets = config.cache.freshness("set_list");
    assert_eq!(sets.stale_time, Duration::from_secs(10));
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Config::load(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(Error::Config(ConfigError::ReadFile(_)))));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let file = write_temp_config("[cache\nstale_time_ms = 1");
    let result = Config::load(file.path());
    assert!(matches!(result, Err(Error::Config(ConfigError::Parse(_)))));
}

#[test]
fn rejects_zero_member_cap() {
    let file = write_temp_config("[comparison]\nmax_members = 0\n");
    let err = Config::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("max_members"));
}

#[test]
fn rejects_max_delay_below_initial_delay() {
    let file = write_temp_config("[retry]\ninitial_delay_ms = 5000\nmax_delay_ms = 100\n");
    let result = Config::load(file.path());
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::InvalidValue {
            field: "max_delay_ms",
            ..
        }))
    ));
}

#[test]
fn rejects_unknown_log_format() {
    let file = write_temp_config("[logging]\nformat = \"xml\"\n");
    let err = Config::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("format"));
}
