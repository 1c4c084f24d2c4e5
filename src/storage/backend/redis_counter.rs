//! Redis 计数器存储
//!
//! Key 布局：
//! - `{prefix}banner:{id}:clicks`：累计点击数（INCR）
//! - `{prefix}banner:{id}:{bucket_start_unix}`：时间桶计数（INCRBY）
//!
//! 一批事件通过一次 pipeline 往返写入。pipeline 不是事务：
//! 中途失败时部分 INCRBY 可能已生效，但每条 INCRBY 本身是原子的。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, error, trace};

use super::{counter_buckets, sparse_series};
use crate::analytics::{AggregatedCount, ClickEvent, Granularity};
use crate::errors::{ClickerError, Result};
use crate::storage::ClickStore;

pub struct RedisCounterStore {
    /// 自动重连的多路复用连接，可廉价克隆
    conn: ConnectionManager,
    key_prefix: String,
    granularity: Granularity,
}

impl RedisCounterStore {
    pub async fn connect(url: &str, key_prefix: &str, granularity: Granularity) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            ClickerError::configuration(format!("Invalid Redis URL '{}': {}", url, e))
        })?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to connect to Redis at {}: {}", url, e);
            ClickerError::storage_unavailable(format!("Redis connection failed: {}", e))
        })?;

        debug!(
            "RedisCounterStore connected, prefix: '{}', granularity: {}s",
            key_prefix,
            granularity.as_secs()
        );

        Ok(Self {
            conn,
            key_prefix: key_prefix.to_string(),
            granularity,
        })
    }

    pub fn total_key(&self, entity_id: i64) -> String {
        total_key(&self.key_prefix, entity_id)
    }

    pub fn bucket_key(&self, entity_id: i64, occurred_at: DateTime<Utc>) -> String {
        bucket_key(
            &self.key_prefix,
            entity_id,
            self.granularity.bucket_start(occurred_at),
        )
    }
}

fn total_key(prefix: &str, entity_id: i64) -> String {
    format!("{}banner:{}:clicks", prefix, entity_id)
}

fn bucket_key(prefix: &str, entity_id: i64, bucket_start: DateTime<Utc>) -> String {
    format!("{}banner:{}:{}", prefix, entity_id, bucket_start.timestamp())
}

/// 区分 pipeline 失败原因：连接层失败视为后端不可用，
/// 服务端返回的命令错误（如 WRONGTYPE）意味着批次只被部分应用
fn classify_batch_error(err: redis::RedisError, batch_len: usize) -> ClickerError {
    if err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout()
    {
        ClickerError::storage_unavailable(format!("Redis pipeline failed: {}", err))
    } else {
        ClickerError::partial_batch_failure(format!(
            "Redis rejected part of a {}-event batch: {}",
            batch_len, err
        ))
    }
}

#[async_trait]
impl ClickStore for RedisCounterStore {
    fn backend_name(&self) -> &str {
        "redis"
    }

    async fn increment_total(&self, entity_id: i64) -> Result<u64> {
        let mut conn = self.conn.clone();
        let total: u64 = conn.incr(self.total_key(entity_id), 1).await?;
        trace!("RedisCounterStore: entity {} total -> {}", entity_id, total);
        Ok(total)
    }

    async fn total_count(&self, entity_id: i64) -> Result<u64> {
        let mut conn = self.conn.clone();
        let total: Option<u64> = conn.get(self.total_key(entity_id)).await?;
        Ok(total.unwrap_or(0))
    }

    async fn apply_batch(&self, batch: &[ClickEvent]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for event in batch {
            pipe.incr(self.bucket_key(event.entity_id, event.occurred_at), 1)
                .ignore();
        }

        let mut conn = self.conn.clone();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| classify_batch_error(e, batch.len()))?;

        debug!("RedisCounterStore: applied {} events", batch.len());
        Ok(())
    }

    async fn query_range(
        &self,
        entity_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AggregatedCount>> {
        let starts = counter_buckets(self.granularity, from, to)?;
        if starts.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for start in &starts {
            pipe.get(self.bucket_key(entity_id, *start));
        }

        let mut conn = self.conn.clone();
        let counts: Vec<Option<u64>> = pipe.query_async(&mut conn).await?;

        Ok(sparse_series(entity_id, &starts, &counts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(total_key("", 42), "banner:42:clicks");
        assert_eq!(total_key("clicker:", 42), "clicker:banner:42:clicks");

        let start = DateTime::from_timestamp(1_699_999_980, 0).unwrap();
        assert_eq!(bucket_key("", 42, start), "banner:42:1699999980");
    }

    #[test]
    fn test_bucket_and_total_keys_never_collide() {
        let start = DateTime::from_timestamp(0, 0).unwrap();
        assert_ne!(bucket_key("p:", 1, start), total_key("p:", 1));
    }

    #[test]
    fn test_classify_io_error_as_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = classify_batch_error(redis::RedisError::from(io), 10);
        assert!(matches!(err, ClickerError::StorageUnavailable(_)));
    }

    // 以下测试需要本地 Redis（REDIS_URL，默认 redis://127.0.0.1:6379/）
    // 运行：cargo test -- --ignored

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    /// 每个测试使用独立前缀，避免互相干扰
    async fn connect_live(name: &str) -> RedisCounterStore {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/".to_string());
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let prefix = format!("clicker-test:{}:{}:", name, nanos);
        RedisCounterStore::connect(&url, &prefix, Granularity::MINUTE)
            .await
            .expect("Redis should be reachable")
    }

    #[tokio::test]
    #[ignore]
    async fn test_live_batch_and_range_roundtrip() {
        let store = connect_live("roundtrip").await;
        let t = 1_700_000_040;

        let batch = vec![
            ClickEvent::new(42, ts(t + 10)),
            ClickEvent::new(42, ts(t + 11)),
            ClickEvent::new(42, ts(t + 12)),
            ClickEvent::new(42, ts(t + 70)),
            ClickEvent::new(42, ts(t + 75)),
            ClickEvent::new(7, ts(t + 10)),
        ];
        store.apply_batch(&batch).await.unwrap();

        // 未写入的桶读到 nil，结果中不出现
        let series = store.query_range(42, ts(t), ts(t + 3600)).await.unwrap();
        let counts: Vec<(DateTime<Utc>, u64)> =
            series.iter().map(|c| (c.bucket_start, c.count)).collect();
        assert_eq!(counts, vec![(ts(t), 3), (ts(t + 60), 2)]);
        assert_eq!(series.iter().map(|c| c.count).sum::<u64>(), 5);

        // 半开区间：to 所在的桶不计入
        let series = store.query_range(42, ts(t), ts(t + 60)).await.unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].count, 3);

        // 再写一批同桶事件，计数累加
        store
            .apply_batch(&[ClickEvent::new(42, ts(t + 20))])
            .await
            .unwrap();
        let series = store.query_range(42, ts(t), ts(t + 60)).await.unwrap();
        assert_eq!(series[0].count, 4);
    }

    #[tokio::test]
    #[ignore]
    async fn test_live_increment_and_total() {
        let store = connect_live("total").await;

        assert_eq!(store.total_count(42).await.unwrap(), 0);
        for expected in 1..=5 {
            assert_eq!(store.increment_total(42).await.unwrap(), expected);
        }
        assert_eq!(store.total_count(42).await.unwrap(), 5);
        assert_eq!(store.total_count(43).await.unwrap(), 0);
    }

    #[tokio::test]
    #[ignore]
    async fn test_live_non_integer_bucket_is_partial_failure() {
        let store = connect_live("partial").await;
        let t = 1_700_000_040;

        let mut conn = store.conn.clone();
        let poisoned = store.bucket_key(42, ts(t));
        let _: () = conn.set(&poisoned, "not-a-number").await.unwrap();

        let batch = vec![ClickEvent::new(42, ts(t + 5)), ClickEvent::new(42, ts(t + 65))];
        let err = store.apply_batch(&batch).await.unwrap_err();
        assert!(matches!(err, ClickerError::PartialBatchFailure(_)));

        // pipeline 不是事务，其余命令仍然生效
        let healthy: Option<u64> = conn.get(store.bucket_key(42, ts(t + 65))).await.unwrap();
        assert_eq!(healthy, Some(1));
    }
}
