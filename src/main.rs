use anyhow::Context;
use clap::Parser;
use tracing::debug;

use clicker::cli::Cli;
use clicker::config::{get_config, init_config_from};
use clicker::interfaces::cli::run_cli_command;
use clicker::system::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // .env 不存在时忽略
    dotenvy::dotenv().ok();

    init_config_from(&cli.config);
    let config = get_config();

    let guard = init_logging(&config.logging).context("failed to initialize logging")?;
    debug!("Configuration loaded: {:?}", config);

    if let Err(e) = run_cli_command(&config, cli.command).await {
        eprintln!("{}", e.format_colored());
        // exit 不会运行析构，先刷出日志
        drop(guard);
        std::process::exit(1);
    }

    Ok(())
}
