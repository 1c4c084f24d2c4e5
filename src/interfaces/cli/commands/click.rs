//! Record clicks command

use colored::Colorize;

use super::submit_with_backoff;
use crate::analytics::ClickEvent;
use crate::interfaces::cli::CliError;
use crate::service::ClickService;
use crate::utils::TimeParser;

pub async fn record_clicks(
    service: &ClickService,
    entity_id: i64,
    count: u64,
    at: Option<String>,
) -> Result<(), CliError> {
    if count == 0 {
        return Err(CliError::ParseError("--count must be at least 1".to_string()));
    }

    let occurred_at = at
        .as_deref()
        .map(TimeParser::parse_timestamp)
        .transpose()
        .map_err(|e| CliError::ParseError(e.message().to_string()))?;

    let mut total = 0;
    for _ in 0..count {
        let event = match occurred_at {
            Some(ts) => ClickEvent::new(entity_id, ts),
            None => ClickEvent::now(entity_id),
        };
        submit_with_backoff(service, event).await?;
        total = service.increment_total(entity_id).await?;
    }

    println!(
        "{} Recorded {} click(s) for banner {}",
        "✓".bold().green(),
        count.to_string().green(),
        entity_id.to_string().cyan()
    );
    println!(
        "  {} {}",
        "Total clicks:".dimmed(),
        total.to_string().bold()
    );
    Ok(())
}
