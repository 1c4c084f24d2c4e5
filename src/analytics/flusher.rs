//! 后台批量刷盘任务
//!
//! 单个 tokio 任务，在一个 `select!` 上同时等待三个唤醒源：
//! - 关闭信号：关闭接收端，排空队列后退出
//! - 新事件：追加到当前批次，达到 `size_threshold` 立即刷盘
//! - 定时器：周期为 `flush_interval`，批次非空才刷盘
//!
//! 刷盘失败（含超时）不重试：记录错误并丢弃该批，计入 `FlushStats`。

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::Receiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace};

use super::ClickEvent;
use crate::storage::{ClickStore, with_timeout};

/// 刷盘触发原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    Size,
    Timer,
    Shutdown,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushTrigger::Size => write!(f, "size"),
            FlushTrigger::Timer => write!(f, "timer"),
            FlushTrigger::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// 刷盘计数器（无锁，可与刷盘任务并发读取）
#[derive(Debug, Default)]
pub struct FlushStats {
    batches_flushed: AtomicU64,
    events_flushed: AtomicU64,
    batches_dropped: AtomicU64,
    events_dropped: AtomicU64,
}

/// `FlushStats` 的某一时刻快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushStatsSnapshot {
    pub batches_flushed: u64,
    pub events_flushed: u64,
    pub batches_dropped: u64,
    pub events_dropped: u64,
}

impl FlushStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_flushed(&self, events: usize) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.events_flushed
            .fetch_add(events as u64, Ordering::Relaxed);
    }

    fn record_dropped(&self, events: usize) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
        self.events_dropped
            .fetch_add(events as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FlushStatsSnapshot {
        FlushStatsSnapshot {
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            events_flushed: self.events_flushed.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }
}

/// 批量刷盘任务
///
/// 持有缓冲区的唯一接收端，批次只在本任务内可变。
pub struct BatchFlusher {
    rx: Receiver<ClickEvent>,
    shutdown: watch::Receiver<bool>,
    store: Arc<dyn ClickStore>,
    stats: Arc<FlushStats>,
    size_threshold: usize,
    flush_interval: Duration,
    storage_timeout: Duration,
}

impl BatchFlusher {
    pub fn new(
        rx: Receiver<ClickEvent>,
        shutdown: watch::Receiver<bool>,
        store: Arc<dyn ClickStore>,
        stats: Arc<FlushStats>,
        size_threshold: usize,
        flush_interval: Duration,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            rx,
            shutdown,
            store,
            stats,
            size_threshold: size_threshold.max(1),
            flush_interval,
            storage_timeout,
        }
    }

    /// 在当前 tokio 运行时上启动刷盘任务
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// 刷盘主循环，收到关闭信号或所有发送端都已释放时返回
    pub async fn run(mut self) {
        let mut batch: Vec<ClickEvent> = Vec::with_capacity(self.size_threshold);

        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval 的第一次 tick 立即完成
        ticker.tick().await;

        debug!(
            "BatchFlusher started (size threshold {}, interval {}ms, backend {})",
            self.size_threshold,
            self.flush_interval.as_millis(),
            self.store.backend_name()
        );

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    // 发送端被释放同样视为关闭
                    if changed.is_err() || *self.shutdown.borrow() {
                        self.drain(batch).await;
                        return;
                    }
                }
                received = self.rx.recv() => match received {
                    Some(event) => {
                        trace!("BatchFlusher: received click for entity {}", event.entity_id);
                        batch.push(event);
                        if batch.len() >= self.size_threshold {
                            self.flush(&mut batch, FlushTrigger::Size).await;
                        }
                    }
                    None => {
                        debug!("BatchFlusher: all senders dropped");
                        self.flush(&mut batch, FlushTrigger::Shutdown).await;
                        return;
                    }
                },
                _ = ticker.tick() => {
                    if batch.is_empty() {
                        trace!("BatchFlusher: timer tick with empty batch");
                    } else {
                        self.flush(&mut batch, FlushTrigger::Timer).await;
                    }
                }
            }
        }
    }

    /// 关闭接收端后排空队列，按阈值分批写入
    async fn drain(&mut self, mut batch: Vec<ClickEvent>) {
        self.rx.close();

        while let Some(event) = self.rx.recv().await {
            batch.push(event);
            if batch.len() >= self.size_threshold {
                self.flush(&mut batch, FlushTrigger::Shutdown).await;
            }
        }
        self.flush(&mut batch, FlushTrigger::Shutdown).await;

        let stats = self.stats.snapshot();
        info!(
            "BatchFlusher stopped: {} batches / {} events flushed, {} batches / {} events dropped",
            stats.batches_flushed, stats.events_flushed, stats.batches_dropped, stats.events_dropped
        );
    }

    /// 写入当前批次并清空（无论成功与否）
    async fn flush(&self, batch: &mut Vec<ClickEvent>, trigger: FlushTrigger) {
        if batch.is_empty() {
            return;
        }

        let count = batch.len();
        let result = with_timeout(
            "apply_batch",
            self.storage_timeout,
            self.store.apply_batch(batch),
        )
        .await;

        match result {
            Ok(()) => {
                self.stats.record_flushed(count);
                debug!(
                    "BatchFlusher: flushed {} events to {} (trigger: {})",
                    count,
                    self.store.backend_name(),
                    trigger
                );
            }
            Err(e) => {
                self.stats.record_dropped(count);
                error!(
                    "BatchFlusher: failed to flush {} events to {} (trigger: {}), batch dropped: {}",
                    count,
                    self.store.backend_name(),
                    trigger,
                    e
                );
            }
        }

        batch.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{AggregatedCount, AggregationBuffer};
    use crate::errors::{ClickerError, Result};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    /// 记录每次 apply_batch 的批次大小
    struct RecordingStore {
        batches: Mutex<Vec<usize>>,
        fail: bool,
    }

    impl RecordingStore {
        fn new(fail: bool) -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                fail,
            }
        }

        fn batches(&self) -> Vec<usize> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ClickStore for RecordingStore {
        fn backend_name(&self) -> &str {
            "recording"
        }

        async fn increment_total(&self, _entity_id: i64) -> Result<u64> {
            Ok(0)
        }

        async fn total_count(&self, _entity_id: i64) -> Result<u64> {
            Ok(0)
        }

        async fn apply_batch(&self, batch: &[ClickEvent]) -> Result<()> {
            self.batches.lock().unwrap().push(batch.len());
            if self.fail {
                return Err(ClickerError::storage_unavailable("down"));
            }
            Ok(())
        }

        async fn query_range(
            &self,
            _entity_id: i64,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<Vec<AggregatedCount>> {
            Ok(Vec::new())
        }
    }

    struct Harness {
        buffer: AggregationBuffer,
        store: Arc<RecordingStore>,
        stats: Arc<FlushStats>,
        shutdown_tx: watch::Sender<bool>,
        handle: JoinHandle<()>,
    }

    fn start(fail: bool) -> Harness {
        let (buffer, rx) = AggregationBuffer::channel(1000);
        let store = Arc::new(RecordingStore::new(fail));
        let stats = Arc::new(FlushStats::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = BatchFlusher::new(
            rx,
            shutdown_rx,
            Arc::clone(&store) as Arc<dyn ClickStore>,
            Arc::clone(&stats),
            100,
            Duration::from_secs(1),
            Duration::from_secs(5),
        )
        .spawn();
        Harness {
            buffer,
            store,
            stats,
            shutdown_tx,
            handle,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_threshold_flushes_without_timer() {
        let h = start(false);
        for _ in 0..150 {
            h.buffer.submit(ClickEvent::now(42)).unwrap();
        }

        // 远小于定时器周期，只可能由数量触发
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.store.batches(), vec![100]);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(h.store.batches(), vec![100, 50]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_batch_flushes_once_after_interval() {
        let h = start(false);
        for _ in 0..7 {
            h.buffer.submit(ClickEvent::now(1)).unwrap();
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(h.store.batches().is_empty());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.store.batches(), vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_tick_writes_nothing() {
        let h = start(false);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(h.store.batches().is_empty());
        assert_eq!(h.stats.snapshot(), FlushStatsSnapshot::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_flush_drops_batch() {
        let h = start(true);
        for _ in 0..3 {
            h.buffer.submit(ClickEvent::now(1)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(1100)).await;

        // 失败的批次不会重试
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.store.batches(), vec![3]);

        let stats = h.stats.snapshot();
        assert_eq!(stats.batches_dropped, 1);
        assert_eq!(stats.events_dropped, 3);
        assert_eq!(stats.events_flushed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_queue() {
        let h = start(false);
        for _ in 0..230 {
            h.buffer.submit(ClickEvent::now(5)).unwrap();
        }

        h.shutdown_tx.send(true).unwrap();
        h.handle.await.unwrap();

        let total: usize = h.store.batches().iter().sum();
        assert_eq!(total, 230);
        assert!(h.store.batches().iter().all(|n| *n <= 100));
        assert_eq!(h.stats.snapshot().events_flushed, 230);

        // 关闭后提交被拒绝
        assert!(matches!(
            h.buffer.submit(ClickEvent::now(5)),
            Err(ClickerError::ServiceStopped(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_senders_dropped_flushes_remainder() {
        let h = start(false);
        for _ in 0..4 {
            h.buffer.submit(ClickEvent::now(8)).unwrap();
        }
        drop(h.buffer);
        h.handle.await.unwrap();
        assert_eq!(h.store.batches(), vec![4]);
    }

    #[test]
    fn test_trigger_display() {
        assert_eq!(FlushTrigger::Size.to_string(), "size");
        assert_eq!(FlushTrigger::Timer.to_string(), "timer");
        assert_eq!(FlushTrigger::Shutdown.to_string(), "shutdown");
    }
}
