//! Command-line interface definitions.
//!
//! Defines the CLI structure for comparesync using `clap`: managing
//! comparison sets, inspecting price history and comparing the members of
//! a set over a time range.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{SetId, StockCode, TimeRange};

/// Default configuration path, used only when the file exists.
pub const DEFAULT_CONFIG: &str = "config.toml";

/// Comparison-set client for the stock comparison backend
#[derive(Parser, Debug)]
#[command(name = "comparesync")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Use the built-in in-memory backend instead of the REST API
    #[arg(long, global = true)]
    pub mock: bool,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage comparison sets
    #[command(subcommand)]
    Sets(SetsCommand),

    /// Show price history for one company
    Prices(PricesArgs),

    /// Compare the price performance of every member of a set
    Compare(CompareArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Subcommands for `comparesync sets`.
#[derive(Subcommand, Debug)]
pub enum SetsCommand {
    /// List your comparison sets
    List,
    /// Show one set with its member companies
    Show {
        /// Set identifier
        id: SetId,
    },
    /// Create an empty set
    Create {
        /// Display name
        name: String,
    },
    /// Rename a set
    Rename {
        id: SetId,
        /// New display name
        name: String,
    },
    /// Add a company to a set
    Add {
        id: SetId,
        /// Stock code, e.g. 005930
        stock_code: StockCode,
    },
    /// Remove a company from a set
    Remove { id: SetId, stock_code: StockCode },
    /// Delete a set
    Delete { id: SetId },
}

/// Arguments for `comparesync prices`.
#[derive(Args, Debug)]
pub struct PricesArgs {
    /// Stock code, e.g. 005930
    pub stock_code: StockCode,

    /// Time range [1M, 3M, 6M, 1Y, 3Y, 5Y]
    #[arg(short, long, default_value = "6M")]
    pub range: TimeRange,
}

/// Arguments for `comparesync compare`.
#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Set identifier
    pub id: SetId,

    /// Time range [1M, 3M, 6M, 1Y, 3Y, 5Y]
    #[arg(short, long, default_value = "6M")]
    pub range: TimeRange,
}

/// Subcommands for `comparesync config`.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the configuration file and print the effective settings
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_range_and_global_flags() {
        let cli = Cli::parse_from(["comparesync", "compare", "1", "--range", "1y", "--mock"]);
        assert!(cli.mock);
        match cli.command {
            Commands::Compare(args) => {
                assert_eq!(args.id.as_str(), "1");
                assert_eq!(args.range, TimeRange::OneYear);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_stock_code() {
        assert!(Cli::try_parse_from(["comparesync", "prices", "00-59"]).is_err());
    }
}
