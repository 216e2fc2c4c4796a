//! CLI entry: loads configuration, wires services and dispatches.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::command::{Cli, Commands, ConfigCommand, DEFAULT_CONFIG};
use super::output::{self, OutputConfig};
use super::{config, prices, sets};
use crate::error::{ConfigError, Result};
use crate::infrastructure::bootstrap::Services;
use crate::infrastructure::config::settings::Config;

/// An explicit `--config` must exist; the default path is optional.
fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG);
            default.exists().then_some(default)
        }
    }
}

fn connect(config: &Config, mock: bool, needs_auth: bool) -> Result<Services> {
    let services = Services::connect(config, mock)?;
    if needs_auth && !services.auth.is_authenticated() {
        return Err(ConfigError::InvalidValue {
            field: "token_env",
            reason: format!(
                "set {} to access your comparison sets",
                config.api.token_env
            ),
        }
        .into());
    }
    Ok(services)
}

/// Run the parsed command line.
///
/// # Errors
///
/// Configuration, validation, backend and fetch errors, for the caller to
/// report and turn into a non-zero exit code.
pub async fn execute(cli: Cli) -> Result<()> {
    output::configure(OutputConfig::new(cli.json, cli.quiet));

    let path = resolve_config_path(cli.config.as_deref());
    let config = match &path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.init_logging();
    debug!(config = ?path, mock = cli.mock, "Configuration loaded");

    match cli.command {
        Commands::Config(ConfigCommand::Validate) => {
            config::execute_validate(path.as_deref(), &config);
            Ok(())
        }
        Commands::Sets(command) => {
            let services = connect(&config, cli.mock, true)?;
            sets::execute(command, &services).await
        }
        Commands::Prices(args) => {
            let services = connect(&config, cli.mock, false)?;
            prices::execute_prices(args, &services).await
        }
        Commands::Compare(args) => {
            let services = connect(&config, cli.mock, true)?;
            prices::execute_compare(args, &services).await
        }
    }
}
