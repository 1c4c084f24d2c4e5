//! 存储调用超时控制
//!
//! apply_batch / query_range 等调用都经过这里，避免后端卡死时无限等待。
//! 超时不重试：批量写入失败即丢弃该批（见 `analytics::flusher`）。

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::{ClickerError, Result};

/// 带超时的存储调用，超时映射为 `StorageUnavailable`
pub async fn with_timeout<T, Fut>(operation_name: &str, limit: Duration, operation: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_elapsed) => {
            warn!(
                "Operation '{}' timed out after {}ms",
                operation_name,
                limit.as_millis()
            );
            Err(ClickerError::storage_unavailable(format!(
                "Operation '{}' timed out after {}ms",
                operation_name,
                limit.as_millis()
            )))
        }
    }
}
