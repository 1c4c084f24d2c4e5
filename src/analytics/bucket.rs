//! 时间桶划分
//!
//! 写入端（apply_batch）和读取端（query_range）必须使用同一个 Granularity，
//! 否则写入的计数无法被查询到。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::{AggregatedCount, ClickEvent};
use crate::errors::{ClickerError, Result};

/// 时间桶宽度（秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Granularity {
    secs: i64,
}

impl Granularity {
    pub const MINUTE: Granularity = Granularity { secs: 60 };
    pub const HOUR: Granularity = Granularity { secs: 3600 };
    /// 最大桶宽：366 天
    pub const MAX_SECS: i64 = 366 * 24 * 3600;

    pub fn from_secs(secs: i64) -> Result<Self> {
        if secs <= 0 {
            return Err(ClickerError::configuration(format!(
                "bucket granularity must be a positive number of seconds, got {}",
                secs
            )));
        }
        if secs > Self::MAX_SECS {
            return Err(ClickerError::configuration(format!(
                "bucket granularity must not exceed {} seconds (366 days), got {}",
                Self::MAX_SECS,
                secs
            )));
        }
        Ok(Self { secs })
    }

    pub fn as_secs(&self) -> i64 {
        self.secs
    }

    /// 将时间戳向下截断到所在桶的起点（秒级，负时间戳同样向下取整）
    pub fn bucket_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let secs = ts.timestamp();
        let start = secs - secs.rem_euclid(self.secs);
        DateTime::from_timestamp(start, 0).unwrap_or(ts)
    }

    pub fn bucket_key(&self, event: &ClickEvent) -> BucketKey {
        BucketKey {
            entity_id: event.entity_id,
            bucket_start: self.bucket_start(event.occurred_at),
        }
    }

    /// 枚举 [from, to) 覆盖的所有桶起点
    ///
    /// 从 `bucket_start(from)` 开始，因此 from 不必对齐。
    pub fn bucket_starts(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let end = to.timestamp();
        let mut cursor = self.bucket_start(from).timestamp();
        let mut starts = Vec::new();
        while cursor < end {
            if let Some(ts) = DateTime::from_timestamp(cursor, 0) {
                starts.push(ts);
            }
            cursor += self.secs;
        }
        starts
    }

    /// [from, to) 覆盖的桶数量（不分配内存）
    pub fn bucket_count(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
        let start = self.bucket_start(from).timestamp();
        let end = to.timestamp();
        if end <= start {
            return 0;
        }
        ((end - start + self.secs - 1) / self.secs) as u64
    }
}

impl Default for Granularity {
    fn default() -> Self {
        Self::MINUTE
    }
}

/// (entity_id, bucket_start)，不持久化，写入端和读取端各自计算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    pub entity_id: i64,
    pub bucket_start: DateTime<Utc>,
}

/// 客户端聚合：按时间桶统计事件数，结果按时间升序且不含零计数桶
pub fn aggregate_events(
    entity_id: i64,
    events: &[ClickEvent],
    granularity: Granularity,
) -> Vec<AggregatedCount> {
    let mut buckets: BTreeMap<DateTime<Utc>, u64> = BTreeMap::new();
    for event in events.iter().filter(|e| e.entity_id == entity_id) {
        *buckets
            .entry(granularity.bucket_start(event.occurred_at))
            .or_insert(0) += 1;
    }

    buckets
        .into_iter()
        .map(|(bucket_start, count)| AggregatedCount {
            entity_id,
            bucket_start,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_from_secs_rejects_non_positive() {
        assert!(Granularity::from_secs(0).is_err());
        assert!(Granularity::from_secs(-60).is_err());
        assert_eq!(Granularity::from_secs(60).unwrap(), Granularity::MINUTE);
    }

    #[test]
    fn test_from_secs_rejects_oversized() {
        assert!(matches!(
            Granularity::from_secs(i64::MAX),
            Err(ClickerError::Configuration(_))
        ));
        assert!(Granularity::from_secs(Granularity::MAX_SECS + 1).is_err());

        let g = Granularity::from_secs(Granularity::MAX_SECS).unwrap();
        assert_eq!(g.bucket_count(ts(1_700_000_000), ts(1_700_003_600)), 1);
        assert_eq!(g.bucket_starts(ts(1_700_000_000), ts(1_700_003_600)).len(), 1);
    }

    #[test]
    fn test_bucket_start_truncates_to_minute() {
        let g = Granularity::MINUTE;
        assert_eq!(g.bucket_start(ts(1_700_000_010)), ts(1_699_999_980));
        assert_eq!(g.bucket_start(ts(1_699_999_980)), ts(1_699_999_980));
        assert_eq!(g.bucket_start(ts(1_700_000_039)), ts(1_700_000_039 - 59));
    }

    #[test]
    fn test_bucket_start_negative_timestamp_floors() {
        let g = Granularity::MINUTE;
        assert_eq!(g.bucket_start(ts(-1)), ts(-60));
        assert_eq!(g.bucket_start(ts(-60)), ts(-60));
    }

    #[test]
    fn test_bucket_start_ignores_subseconds() {
        let g = Granularity::HOUR;
        let t = DateTime::from_timestamp(7200 + 59, 999_000_000).unwrap();
        assert_eq!(g.bucket_start(t), ts(7200));
    }

    #[test]
    fn test_bucket_starts_half_open_range() {
        let g = Granularity::MINUTE;
        let starts = g.bucket_starts(ts(0), ts(180));
        assert_eq!(starts, vec![ts(0), ts(60), ts(120)]);

        // 未对齐的 from 从所在桶开始
        let starts = g.bucket_starts(ts(30), ts(121));
        assert_eq!(starts, vec![ts(0), ts(60), ts(120)]);
        assert_eq!(g.bucket_count(ts(30), ts(121)), 3);

        assert!(g.bucket_starts(ts(60), ts(60)).is_empty());
        assert_eq!(g.bucket_count(ts(60), ts(60)), 0);
    }

    #[test]
    fn test_bucket_key_uses_shared_granularity() {
        let g = Granularity::MINUTE;
        let key = g.bucket_key(&ClickEvent::new(42, ts(125)));
        assert_eq!(key.entity_id, 42);
        assert_eq!(key.bucket_start, ts(120));
    }

    #[test]
    fn test_aggregate_events_sparse_and_sorted() {
        let g = Granularity::MINUTE;
        let events = vec![
            ClickEvent::new(42, ts(70)),
            ClickEvent::new(42, ts(10)),
            ClickEvent::new(7, ts(15)),
            ClickEvent::new(42, ts(11)),
            ClickEvent::new(42, ts(75)),
            ClickEvent::new(42, ts(12)),
        ];

        let series = aggregate_events(42, &events, g);
        assert_eq!(
            series,
            vec![
                AggregatedCount {
                    entity_id: 42,
                    bucket_start: ts(0),
                    count: 3
                },
                AggregatedCount {
                    entity_id: 42,
                    bucket_start: ts(60),
                    count: 2
                },
            ]
        );
    }
}
