//! 聚合缓冲区
//!
//! 多生产者（请求处理任务）→ 单消费者（BatchFlusher）的有界队列。
//! 队列满时 `submit` 立即返回 `Backpressure`，不阻塞调用方，也不静默丢弃。

use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tracing::{trace, warn};

use super::ClickEvent;
use crate::errors::{ClickerError, Result};

/// 缓冲区发送端，可廉价克隆给任意数量的调用方
#[derive(Clone, Debug)]
pub struct AggregationBuffer {
    tx: Sender<ClickEvent>,
    capacity: usize,
}

impl AggregationBuffer {
    /// 创建缓冲区，返回发送端和交给 BatchFlusher 的接收端
    pub fn channel(capacity: usize) -> (Self, Receiver<ClickEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, capacity }, rx)
    }

    /// 提交点击事件（非阻塞）
    ///
    /// 返回 Ok 只表示事件已入队，不代表已持久化。
    pub fn submit(&self, event: ClickEvent) -> Result<()> {
        match self.tx.try_send(event) {
            Ok(()) => {
                trace!(
                    "AggregationBuffer: queued click for entity {}",
                    event.entity_id
                );
                Ok(())
            }
            Err(TrySendError::Full(event)) => {
                warn!(
                    "AggregationBuffer: buffer full (capacity {}), rejecting click for entity {}",
                    self.capacity, event.entity_id
                );
                Err(ClickerError::backpressure(format!(
                    "click buffer is full (capacity {})",
                    self.capacity
                )))
            }
            Err(TrySendError::Closed(_)) => Err(ClickerError::service_stopped(
                "click buffer is closed, the service is shutting down",
            )),
        }
    }

    /// 当前排队中的事件数（尚未被 BatchFlusher 取走）
    pub fn pending(&self) -> usize {
        self.capacity.saturating_sub(self.tx.capacity())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_submit_until_full_returns_backpressure() {
        let (buffer, mut rx) = AggregationBuffer::channel(3);

        for _ in 0..3 {
            buffer.submit(ClickEvent::now(1)).unwrap();
        }
        assert_eq!(buffer.pending(), 3);

        let err = buffer.submit(ClickEvent::now(1)).unwrap_err();
        assert!(matches!(err, ClickerError::Backpressure(_)));

        // 消费一个后重新有空位
        rx.recv().await.unwrap();
        assert!(buffer.submit(ClickEvent::now(1)).is_ok());
    }

    #[tokio::test]
    async fn test_submit_after_receiver_closed() {
        let (buffer, rx) = AggregationBuffer::channel(10);
        drop(rx);

        assert!(buffer.is_closed());
        let err = buffer.submit(ClickEvent::new(1, Utc::now())).unwrap_err();
        assert!(matches!(err, ClickerError::ServiceStopped(_)));
    }

    #[tokio::test]
    async fn test_events_preserve_submission_order() {
        let (buffer, mut rx) = AggregationBuffer::channel(10);
        for id in 0..5 {
            buffer.submit(ClickEvent::now(id)).unwrap();
        }
        for id in 0..5 {
            assert_eq!(rx.recv().await.unwrap().entity_id, id);
        }
    }
}
