//! CLI interface module
//!
//! Every command except `config generate` runs against a `ClickService`
//! that is shut down (drained) before the command returns.

pub mod commands;

use std::fmt;

use crate::cli::{Commands, ConfigCommands};
use crate::config::StaticConfig;
use crate::errors::ClickerError;
use crate::service::ClickService;
use crate::storage::StoreFactory;
use commands::{config_generate, ingest_clicks, record_clicks, show_stats, show_total};
use tracing::debug;

#[derive(Debug)]
pub enum CliError {
    Service(ClickerError),
    ParseError(String),
    CommandError(String),
}

impl CliError {
    /// Format as simple output
    pub fn format_simple(&self) -> String {
        match self {
            CliError::Service(err) => err.format_simple(),
            CliError::ParseError(msg) => format!("Parse error: {}", msg),
            CliError::CommandError(msg) => format!("Command error: {}", msg),
        }
    }

    /// Format as colored output
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        match self {
            CliError::Service(err) => err.format_colored(),
            CliError::ParseError(msg) => {
                format!("{} {}", "Parse error:".yellow().bold(), msg.white())
            }
            CliError::CommandError(msg) => {
                format!("{} {}", "Command error:".red().bold(), msg.white())
            }
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for CliError {}

impl From<ClickerError> for CliError {
    fn from(err: ClickerError) -> Self {
        CliError::Service(err)
    }
}

/// Run a CLI command from clap-parsed input
pub async fn run_cli_command(config: &StaticConfig, cmd: Commands) -> Result<(), CliError> {
    // Generate doesn't need a storage backend
    if let Commands::Config { action } = cmd {
        return match action {
            ConfigCommands::Generate { output_path, force } => {
                config_generate(output_path, force).await
            }
        };
    }

    let store = StoreFactory::create(config).await?;
    let service = ClickService::start(store, &config.aggregation)?;

    let result = match cmd {
        Commands::Click {
            entity_id,
            count,
            at,
        } => record_clicks(&service, entity_id, count, at).await,
        Commands::Total { entity_id } => show_total(&service, entity_id).await,
        Commands::Stats {
            entity_id,
            from,
            to,
            json,
        } => show_stats(&service, entity_id, &from, &to, json).await,
        Commands::Ingest => ingest_clicks(&service).await,
        Commands::Config { .. } => unreachable!("config commands are handled above"),
    };

    // 命令失败也要排空缓冲区
    let stats = service.shutdown().await;
    debug!(
        "Service stopped: {} events flushed, {} events dropped",
        stats.events_flushed, stats.events_dropped
    );

    if stats.events_dropped > 0 && result.is_ok() {
        return Err(CliError::CommandError(format!(
            "{} clicks could not be written to {}",
            stats.events_dropped,
            service.backend_name()
        )));
    }
    result
}
