//! 存储后端实现
//!
//! - `event_log`: SeaORM 事件日志（SQLite / MySQL / PostgreSQL）
//! - `redis_counter`: Redis 计数器存储
//! - `memory`: 进程内计数器存储

mod connection;
mod event_log;
mod memory;
mod redis_counter;
mod timeout;

use chrono::{DateTime, Utc};

use crate::analytics::{AggregatedCount, Granularity};
use crate::errors::{ClickerError, Result};

pub use connection::{connect_generic, connect_sqlite, run_migrations};
pub use event_log::EventLogStore;
pub use memory::MemoryCounterStore;
pub use redis_counter::RedisCounterStore;
pub use timeout::with_timeout;

/// 单次区间查询允许枚举的最大桶数（分钟粒度约 70 天）
pub const MAX_BUCKETS_PER_QUERY: u64 = 100_000;

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite:")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(ClickerError::configuration(format!(
            "Cannot infer database type from URL: {}. Supported: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// 计数器存储的区间枚举：[from, to) 内的所有桶起点
///
/// 桶数超过 `MAX_BUCKETS_PER_QUERY` 时拒绝查询。
pub(crate) fn counter_buckets(
    granularity: Granularity,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>> {
    let count = granularity.bucket_count(from, to);
    if count > MAX_BUCKETS_PER_QUERY {
        return Err(ClickerError::validation(format!(
            "range covers {} buckets of {}s, limit is {}",
            count,
            granularity.as_secs(),
            MAX_BUCKETS_PER_QUERY
        )));
    }
    Ok(granularity.bucket_starts(from, to))
}

/// 将桶起点与对应计数合并为稀疏序列（缺失或为 0 的桶被省略）
pub(crate) fn sparse_series(
    entity_id: i64,
    starts: &[DateTime<Utc>],
    counts: &[Option<u64>],
) -> Vec<AggregatedCount> {
    starts
        .iter()
        .zip(counts.iter())
        .filter_map(|(start, count)| match count {
            Some(count) if *count > 0 => Some(AggregatedCount {
                entity_id,
                bucket_start: *start,
                count: *count,
            }),
            _ => None,
        })
        .collect()
}
