//! 进程内计数器存储
//!
//! 与 Redis 计数器存储语义一致（每个桶一个计数器），
//! 用于单进程部署和测试。进程退出即丢失全部数据。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::trace;

use super::{counter_buckets, sparse_series};
use crate::analytics::{AggregatedCount, ClickEvent, Granularity};
use crate::errors::Result;
use crate::storage::ClickStore;

pub struct MemoryCounterStore {
    /// (entity_id, bucket_start 秒) -> 计数
    buckets: DashMap<(i64, i64), u64>,
    /// entity_id -> 累计点击数
    totals: DashMap<i64, u64>,
    granularity: Granularity,
}

impl MemoryCounterStore {
    pub fn new(granularity: Granularity) -> Self {
        Self {
            buckets: DashMap::new(),
            totals: DashMap::new(),
            granularity,
        }
    }

    /// 当前保存的非空桶数量
    pub fn bucket_len(&self) -> usize {
        self.buckets.len()
    }
}

#[async_trait]
impl ClickStore for MemoryCounterStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn increment_total(&self, entity_id: i64) -> Result<u64> {
        // entry 持有分片写锁，保证 +1 与读回是原子的
        let mut entry = self.totals.entry(entity_id).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }

    async fn total_count(&self, entity_id: i64) -> Result<u64> {
        Ok(self.totals.get(&entity_id).map(|v| *v).unwrap_or(0))
    }

    async fn apply_batch(&self, batch: &[ClickEvent]) -> Result<()> {
        for event in batch {
            let key = self.granularity.bucket_key(event);
            *self
                .buckets
                .entry((key.entity_id, key.bucket_start.timestamp()))
                .or_insert(0) += 1;
        }
        trace!("MemoryCounterStore: applied {} events", batch.len());
        Ok(())
    }

    async fn query_range(
        &self,
        entity_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AggregatedCount>> {
        let starts = counter_buckets(self.granularity, from, to)?;
        let counts: Vec<Option<u64>> = starts
            .iter()
            .map(|start| {
                self.buckets
                    .get(&(entity_id, start.timestamp()))
                    .map(|v| *v)
            })
            .collect();
        Ok(sparse_series(entity_id, &starts, &counts))
    }
}
