//! Total / stats query commands

use colored::Colorize;

use crate::interfaces::cli::CliError;
use crate::service::ClickService;
use crate::utils::TimeParser;

pub async fn show_total(service: &ClickService, entity_id: i64) -> Result<(), CliError> {
    let total = service.total_count(entity_id).await?;
    println!(
        "{} Banner {} has {} click(s)",
        "ℹ".bold().blue(),
        entity_id.to_string().cyan(),
        total.to_string().green()
    );
    Ok(())
}

pub async fn show_stats(
    service: &ClickService,
    entity_id: i64,
    from: &str,
    to: &str,
    json: bool,
) -> Result<(), CliError> {
    let from = TimeParser::parse_timestamp(from)
        .map_err(|e| CliError::ParseError(format!("--from: {}", e.message())))?;
    let to = TimeParser::parse_timestamp(to)
        .map_err(|e| CliError::ParseError(format!("--to: {}", e.message())))?;

    let stats = service.get_stats(entity_id, from, to).await?;

    if json {
        let output = serde_json::to_string_pretty(&stats)
            .map_err(|e| CliError::CommandError(format!("Failed to serialize stats: {}", e)))?;
        println!("{}", output);
        return Ok(());
    }

    println!(
        "{} {} {} {} {}",
        "Clicks for banner".bold().green(),
        entity_id.to_string().cyan(),
        from.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed(),
        "→".dimmed(),
        to.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed()
    );
    println!();

    if stats.series.is_empty() {
        println!("{} No clicks in this range", "ℹ".bold().blue());
        return Ok(());
    }

    for bucket in &stats.series {
        println!(
            "  {}  {}",
            bucket
                .bucket_start
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .yellow(),
            bucket.count
        );
    }
    println!();
    println!(
        "{} Total {} click(s) in {} bucket(s)",
        "ℹ".bold().blue(),
        stats.total.to_string().green(),
        stats.series.len()
    );
    Ok(())
}
