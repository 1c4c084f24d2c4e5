//! 点击服务
//!
//! `ClickService` 持有缓冲区发送端、刷盘任务、存储后端和统计读取器，
//! 是调用方唯一需要传递的对象（可包在 `Arc` 中共享）。
//!
//! 数据丢失窗口：`submit` 返回 Ok 只表示事件已入队。
//! 进程崩溃时，队列中的事件和正在写入的一批事件会丢失（至多
//! `buffer_capacity + size_threshold` 个）。刷盘失败的批次被丢弃并计入
//! `FlushStats`。正常关闭时在 `shutdown_grace` 内排空队列，超时则中止
//! 刷盘任务并记录警告。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::analytics::{
    AggregationBuffer, BatchFlusher, ClickEvent, ClickStats, FlushStats, FlushStatsSnapshot,
    StatsReader,
};
use crate::config::AggregationConfig;
use crate::errors::Result;
use crate::storage::{ClickStore, with_timeout};

pub struct ClickService {
    buffer: AggregationBuffer,
    store: Arc<dyn ClickStore>,
    reader: StatsReader,
    stats: Arc<FlushStats>,
    shutdown_tx: watch::Sender<bool>,
    flusher: Mutex<Option<JoinHandle<()>>>,
    storage_timeout: Duration,
    shutdown_grace: Duration,
}

impl ClickService {
    /// 校验配置并启动刷盘任务（需要在 tokio 运行时内调用）
    pub fn start(store: Arc<dyn ClickStore>, config: &AggregationConfig) -> Result<Self> {
        config.validate()?;

        let (buffer, rx) = AggregationBuffer::channel(config.buffer_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(FlushStats::new());

        let handle = BatchFlusher::new(
            rx,
            shutdown_rx,
            Arc::clone(&store),
            Arc::clone(&stats),
            config.size_threshold,
            config.flush_interval(),
            config.storage_timeout(),
        )
        .spawn();

        info!(
            "ClickService started: backend {}, buffer {}, batch {} / {}ms",
            store.backend_name(),
            config.buffer_capacity,
            config.size_threshold,
            config.flush_interval_ms
        );

        Ok(Self {
            buffer,
            reader: StatsReader::new(Arc::clone(&store), config.storage_timeout()),
            store,
            stats,
            shutdown_tx,
            flusher: Mutex::new(Some(handle)),
            storage_timeout: config.storage_timeout(),
            shutdown_grace: config.shutdown_grace(),
        })
    }

    /// 提交一次点击（非阻塞，不等待持久化）
    pub fn submit(&self, entity_id: i64, occurred_at: DateTime<Utc>) -> Result<()> {
        self.buffer.submit(ClickEvent::new(entity_id, occurred_at))
    }

    pub fn submit_event(&self, event: ClickEvent) -> Result<()> {
        self.buffer.submit(event)
    }

    /// 记录一次当前时间的点击：入队时间桶事件并累加总数
    ///
    /// 入队失败时不会累加总数。
    pub async fn record_click(&self, entity_id: i64) -> Result<u64> {
        self.submit(entity_id, Utc::now())?;
        self.increment_total(entity_id).await
    }

    /// 原子地累加总点击数，直接访问存储（不经过缓冲区）
    pub async fn increment_total(&self, entity_id: i64) -> Result<u64> {
        with_timeout(
            "increment_total",
            self.storage_timeout,
            self.store.increment_total(entity_id),
        )
        .await
    }

    pub async fn total_count(&self, entity_id: i64) -> Result<u64> {
        with_timeout(
            "total_count",
            self.storage_timeout,
            self.store.total_count(entity_id),
        )
        .await
    }

    /// 查询 [from, to) 内的点击统计，只反映已刷盘的数据
    pub async fn get_stats(
        &self,
        entity_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ClickStats> {
        self.reader.get_stats(entity_id, from, to).await
    }

    pub fn flush_stats(&self) -> FlushStatsSnapshot {
        self.stats.snapshot()
    }

    /// 已入队但尚未被刷盘任务取走的事件数
    pub fn pending(&self) -> usize {
        self.buffer.pending()
    }

    pub fn backend_name(&self) -> &str {
        self.store.backend_name()
    }

    /// 停止接收事件，在宽限期内排空队列
    ///
    /// 重复调用是安全的：排空期间锁一直被持有，
    /// 并发的后续调用会等到排空结束后再返回统计。
    pub async fn shutdown(&self) -> FlushStatsSnapshot {
        let mut flusher = self.flusher.lock().await;
        let Some(mut handle) = flusher.take() else {
            debug!("ClickService: already shut down");
            return self.stats.snapshot();
        };

        info!(
            "ClickService: shutting down, draining {} pending events",
            self.buffer.pending()
        );
        // 接收端已退出时 send 返回 Err，忽略即可
        let _ = self.shutdown_tx.send(true);

        match tokio::time::timeout(self.shutdown_grace, &mut handle).await {
            Ok(Ok(())) => {
                info!("ClickService: flusher drained");
            }
            Ok(Err(e)) => {
                warn!("ClickService: flusher task failed: {}", e);
            }
            Err(_) => {
                handle.abort();
                warn!(
                    "ClickService: drain did not finish within {}ms, {} queued events abandoned",
                    self.shutdown_grace.as_millis(),
                    self.buffer.pending()
                );
            }
        }

        let snapshot = self.stats.snapshot();
        drop(flusher);
        snapshot
    }
}
