//! 点击聚合管线
//!
//! - `bucket`: 时间桶划分（写入端和读取端共用）
//! - `buffer`: 有界缓冲队列
//! - `flusher`: 后台批量刷盘任务
//! - `reader`: 区间统计查询

pub mod bucket;
pub mod buffer;
pub mod flusher;
pub mod reader;

pub use bucket::{BucketKey, Granularity, aggregate_events};
pub use buffer::AggregationBuffer;
pub use flusher::{BatchFlusher, FlushStats, FlushStatsSnapshot, FlushTrigger};
pub use reader::StatsReader;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 单次点击事件
///
/// 创建后不可变，由 BatchFlusher 消费一次。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClickEvent {
    /// banner ID
    pub entity_id: i64,
    /// 点击时间
    pub occurred_at: DateTime<Utc>,
}

impl ClickEvent {
    pub fn new(entity_id: i64, occurred_at: DateTime<Utc>) -> Self {
        Self {
            entity_id,
            occurred_at,
        }
    }

    /// 以当前时间创建点击事件
    pub fn now(entity_id: i64) -> Self {
        Self::new(entity_id, Utc::now())
    }
}

/// 一个时间桶内的点击计数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedCount {
    pub entity_id: i64,
    pub bucket_start: DateTime<Utc>,
    pub count: u64,
}

/// 区间统计结果：总数 + 按时间升序的稀疏序列（不含零计数桶）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClickStats {
    pub total: u64,
    pub series: Vec<AggregatedCount>,
}

impl ClickStats {
    pub fn from_series(series: Vec<AggregatedCount>) -> Self {
        let total = series.iter().map(|c| c.count).sum();
        Self { total, series }
    }
}
