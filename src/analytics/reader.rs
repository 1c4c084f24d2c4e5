//! 区间统计查询

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::ClickStats;
use crate::errors::{ClickerError, Result};
use crate::storage::{ClickStore, with_timeout};

/// 统计读取器
///
/// 不经过缓冲区，直接查询存储后端；尚未刷盘的事件不可见。
#[derive(Clone)]
pub struct StatsReader {
    store: Arc<dyn ClickStore>,
    timeout: Duration,
}

impl StatsReader {
    pub fn new(store: Arc<dyn ClickStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// 查询区间内的点击统计（计数器存储为 [from, to)，事件日志为 [from, to]）
    ///
    /// `from >= to` 时直接返回 `InvalidRange`，不访问存储。
    pub async fn get_stats(
        &self,
        entity_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ClickStats> {
        if from >= to {
            return Err(ClickerError::invalid_range(format!(
                "from ({}) must be earlier than to ({})",
                from.to_rfc3339(),
                to.to_rfc3339()
            )));
        }

        let series = with_timeout(
            "query_range",
            self.timeout,
            self.store.query_range(entity_id, from, to),
        )
        .await?;

        let stats = ClickStats::from_series(series);
        debug!(
            "StatsReader: entity {} has {} clicks in {} buckets",
            entity_id,
            stats.total,
            stats.series.len()
        );
        Ok(stats)
    }
}
