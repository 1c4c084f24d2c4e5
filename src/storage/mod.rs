//! 点击存储
//!
//! 两种存储策略实现同一个 `ClickStore` trait：
//! - 计数器存储（Redis / 内存）：每个时间桶一个原子计数器，丢失单条事件信息
//! - 事件日志（SeaORM）：每次点击一行，每批一个事务，查询时再聚合

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::analytics::{AggregatedCount, ClickEvent};
use crate::config::StaticConfig;
use crate::errors::{ClickerError, Result};

pub mod backend;

pub use backend::{
    EventLogStore, MemoryCounterStore, RedisCounterStore, infer_backend_from_url, with_timeout,
};

/// 存储后端能力集合
///
/// 所有写操作必须使用后端原生的原子 / 事务原语，
/// 以保证与 BatchFlusher 并发调用时的安全性。
#[async_trait]
pub trait ClickStore: Send + Sync {
    /// 后端名称（用于日志）
    fn backend_name(&self) -> &str;

    /// 原子地将实体的累计点击数 +1 并返回新值
    async fn increment_total(&self, entity_id: i64) -> Result<u64>;

    /// 实体的累计点击数
    ///
    /// 计数器存储返回 `increment_total` 维护的计数。
    /// 事件日志返回 `click_events` 的行数，只包含已刷盘的事件，
    /// 因此可能与 `increment_total` 的返回值不同（例如批次被丢弃后）。
    async fn total_count(&self, entity_id: i64) -> Result<u64>;

    /// 写入一批点击事件
    async fn apply_batch(&self, batch: &[ClickEvent]) -> Result<()>;

    /// 查询区间内的时间桶计数，按时间升序，不含零计数桶
    async fn query_range(
        &self,
        entity_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AggregatedCount>>;
}

pub struct StoreFactory;

impl StoreFactory {
    /// 根据配置创建存储后端
    ///
    /// `storage.backend`：
    /// - `redis`：Redis 计数器存储
    /// - `database`：事件日志，数据库类型从 `database.database_url` 推断
    /// - `memory`：进程内计数器存储（单进程 / 测试）
    pub async fn create(config: &StaticConfig) -> Result<Arc<dyn ClickStore>> {
        let granularity = config.aggregation.granularity()?;

        let store: Arc<dyn ClickStore> = match config.storage.backend.to_lowercase().as_str() {
            "redis" => Arc::new(
                RedisCounterStore::connect(
                    &config.redis.url,
                    &config.redis.key_prefix,
                    granularity,
                )
                .await?,
            ),
            "database" | "sqlite" | "postgres" | "mysql" => Arc::new(
                EventLogStore::connect(&config.database, granularity).await?,
            ),
            "memory" => Arc::new(MemoryCounterStore::new(granularity)),
            other => {
                return Err(ClickerError::configuration(format!(
                    "Unknown storage backend '{}'. Supported: redis, database, memory",
                    other
                )));
            }
        };

        info!(
            "Click store initialized: {} (bucket granularity {}s)",
            store.backend_name(),
            granularity.as_secs()
        );
        Ok(store)
    }
}
