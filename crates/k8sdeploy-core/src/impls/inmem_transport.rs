//! InMemoryQueueTransport - 開発用のキュー
//!
//! # 学習ポイント
//! - Mutex<HashMap<String, VecDeque<_>>> でキュー名ごとに FIFO を持つ
//! - fetch は pop（ack 込み）。requeue 指定時は取り出したメッセージを残す
//! - publish されたメッセージは記録され、テストから検査できる

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::{OutboundMessage, TransportError};
use crate::ports::{QueueTransport, RawMessage};

/// InMemoryQueueTransport はプロセス内で完結する QueueTransport
///
/// # 使用例
/// ```ignore
/// let transport = InMemoryQueueTransport::new();
/// transport.push("agent-work", r#"{"action":"info", ...}"#);
///
/// let msg = transport.fetch("agent-work", false).await?;
/// ```
#[derive(Default)]
pub struct InMemoryQueueTransport {
    queues: Mutex<HashMap<String, VecDeque<RawMessage>>>,
    published: Mutex<Vec<(String, OutboundMessage)>>,
    fetches: AtomicUsize,
    fetch_failure: Mutex<Option<TransportError>>,
    publish_failure: Mutex<Option<TransportError>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl InMemoryQueueTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a raw message at the back of `queue`.
    pub fn push(&self, queue: &str, raw: impl Into<RawMessage>) {
        lock(&self.queues)
            .entry(queue.to_string())
            .or_default()
            .push_back(raw.into());
    }

    pub fn len(&self, queue: &str) -> usize {
        lock(&self.queues).get(queue).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, queue: &str) -> bool {
        self.len(queue) == 0
    }

    /// Messages published to `queue`, in publish order.
    pub fn published(&self, queue: &str) -> Vec<OutboundMessage> {
        lock(&self.published)
            .iter()
            .filter(|(q, _)| q == queue)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn fail_fetch(&self, err: TransportError) {
        *lock(&self.fetch_failure) = Some(err);
    }

    pub fn fail_publish(&self, err: TransportError) {
        *lock(&self.publish_failure) = Some(err);
    }
}

#[async_trait]
impl QueueTransport for InMemoryQueueTransport {
    async fn fetch(
        &self,
        queue: &str,
        requeue: bool,
    ) -> Result<Option<RawMessage>, TransportError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = lock(&self.fetch_failure).clone() {
            return Err(err);
        }

        let mut queues = lock(&self.queues);
        let Some(pending) = queues.get_mut(queue) else {
            return Ok(None);
        };
        if requeue {
            // ack_requeue_true: 元の位置に戻る
            Ok(pending.front().cloned())
        } else {
            Ok(pending.pop_front())
        }
    }

    async fn publish(&self, queue: &str, message: &OutboundMessage) -> Result<(), TransportError> {
        if let Some(err) = lock(&self.publish_failure).clone() {
            return Err(err);
        }
        lock(&self.published).push((queue.to_string(), message.clone()));
        Ok(())
    }
}
