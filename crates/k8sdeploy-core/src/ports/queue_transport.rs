//! QueueTransport port - メッセージブローカーの fetch / publish
//!
//! # 設計原則
//! - fetch は「取り出し + ack」を 1 回で行う pop 操作（別途 ack は無い）
//! - ack モード（requeue するかどうか）は fetch 時に決める
//! - 1 回の fetch で取り出すのは最大 1 件
//!
//! # 実装
//! - `k8sdeploy-http`: RabbitMQ management API（本番用）
//! - `impls::InMemoryQueueTransport`: 開発・テスト用

use async_trait::async_trait;

use crate::domain::{OutboundMessage, TransportError};

/// Raw message body as taken off a queue.
pub type RawMessage = String;

#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Pop at most one message from `queue`.
    ///
    /// Returns `Ok(None)` when the queue is empty. With `requeue` set the
    /// message is made visible again instead of being removed.
    async fn fetch(&self, queue: &str, requeue: bool)
    -> Result<Option<RawMessage>, TransportError>;

    /// Publish one message. Best effort, no retry.
    async fn publish(&self, queue: &str, message: &OutboundMessage)
    -> Result<(), TransportError>;
}
