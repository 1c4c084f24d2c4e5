//! Stdin ingest command

use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use super::submit_with_backoff;
use crate::analytics::ClickEvent;
use crate::errors::ClickerError;
use crate::interfaces::cli::CliError;
use crate::service::ClickService;
use crate::system::wait_for_shutdown_signal;
use crate::utils::TimeParser;

/// 解析一行输入：`<entity_id>` 或 `<entity_id>,<timestamp>`
pub(crate) fn parse_line(line: &str) -> Result<ClickEvent, ClickerError> {
    let (id, ts) = match line.split_once(',') {
        Some((id, ts)) => (id, Some(ts)),
        None => (line, None),
    };

    let entity_id: i64 = id
        .trim()
        .parse()
        .map_err(|_| ClickerError::validation(format!("invalid banner id '{}'", id.trim())))?;

    match ts {
        Some(ts) => Ok(ClickEvent::new(entity_id, TimeParser::parse_timestamp(ts)?)),
        None => Ok(ClickEvent::now(entity_id)),
    }
}

pub async fn ingest_clicks(service: &ClickService) -> Result<(), CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut accepted: u64 = 0;
    let mut rejected: u64 = 0;

    let shutdown = wait_for_shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            _ = &mut shutdown => break,
            line = lines.next_line() => line
                .map_err(|e| CliError::CommandError(format!("Failed to read stdin: {}", e)))?,
        };

        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_line(line) {
            Ok(event) => {
                submit_with_backoff(service, event).await?;
                service.increment_total(event.entity_id).await?;
                accepted += 1;
            }
            Err(e) => {
                warn!("Skipping line '{}': {}", line, e);
                rejected += 1;
            }
        }
    }

    println!(
        "{} Ingested {} click(s), skipped {} line(s)",
        "✓".bold().green(),
        accepted.to_string().green(),
        rejected.to_string().yellow()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let event = parse_line("42").unwrap();
        assert_eq!(event.entity_id, 42);

        let event = parse_line("7, 1700000000").unwrap();
        assert_eq!(event.entity_id, 7);
        assert_eq!(event.occurred_at.timestamp(), 1_700_000_000);

        assert!(parse_line("abc").is_err());
        assert!(parse_line("1,yesterday").is_err());
    }
}
