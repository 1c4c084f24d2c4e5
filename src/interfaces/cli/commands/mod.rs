mod click;
mod config_gen;
mod ingest;
mod stats;

pub use click::record_clicks;
pub use config_gen::config_generate;
pub use ingest::ingest_clicks;
pub use stats::{show_stats, show_total};

use std::time::Duration;

use crate::analytics::ClickEvent;
use crate::errors::ClickerError;
use crate::service::ClickService;

/// 缓冲区满时的等待间隔
const BACKPRESSURE_BACKOFF: Duration = Duration::from_millis(10);

/// 提交事件，遇到 Backpressure 时等待刷盘任务腾出空间后重试
///
/// CLI 是唯一的生产者，等待不会饿死其他调用方。
pub(crate) async fn submit_with_backoff(
    service: &ClickService,
    event: ClickEvent,
) -> Result<(), ClickerError> {
    loop {
        match service.submit_event(event) {
            Err(ClickerError::Backpressure(_)) => tokio::time::sleep(BACKPRESSURE_BACKOFF).await,
            other => return other,
        }
    }
}
