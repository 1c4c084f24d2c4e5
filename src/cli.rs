//! Command-line interface definitions using clap
//!
//! This module defines the CLI structure for clicker using clap's derive macros.

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_PATH;

/// Clicker - banner click aggregation
#[derive(Parser)]
#[command(name = "clicker")]
#[command(version)]
#[command(about = "Buffered click ingestion with time-bucketed statistics", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(long, short = 'c', global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Record clicks for a banner
    ///
    /// Without --at every click is stamped with the current time.
    Click {
        /// Banner ID
        entity_id: i64,

        /// Number of clicks to record
        #[arg(long, short = 'n', default_value_t = 1)]
        count: u64,

        /// Click time (RFC3339, unix seconds, "now" or relative like "2h")
        #[arg(long)]
        at: Option<String>,
    },

    /// Show the lifetime click total of a banner
    Total {
        /// Banner ID
        entity_id: i64,
    },

    /// Show bucketed click counts in [from, to)
    Stats {
        /// Banner ID
        entity_id: i64,

        /// Range start (RFC3339, unix seconds, "now" or relative like "1d")
        #[arg(long, default_value = "1h")]
        from: String,

        /// Range end (exclusive)
        #[arg(long, default_value = "now")]
        to: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read clicks from stdin until EOF or Ctrl+C
    ///
    /// One click per line: `<entity_id>` or `<entity_id>,<timestamp>`.
    Ingest,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Force overwrite without confirmation
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_click_command() {
        let cli = Cli::try_parse_from(["clicker", "click", "42", "-n", "3"]).unwrap();
        assert_eq!(cli.config, DEFAULT_CONFIG_PATH);
        match cli.command {
            Commands::Click {
                entity_id,
                count,
                at,
            } => {
                assert_eq!(entity_id, 42);
                assert_eq!(count, 3);
                assert!(at.is_none());
            }
            _ => panic!("expected click command"),
        }
    }

    #[test]
    fn test_parse_stats_defaults() {
        let cli =
            Cli::try_parse_from(["clicker", "--config", "custom.toml", "stats", "7"]).unwrap();
        assert_eq!(cli.config, "custom.toml");
        match cli.command {
            Commands::Stats { from, to, json, .. } => {
                assert_eq!(from, "1h");
                assert_eq!(to, "now");
                assert!(!json);
            }
            _ => panic!("expected stats command"),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["clicker"]).is_err());
    }
}
