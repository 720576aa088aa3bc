//! Shutdown - watch チャネルによる停止要求
//!
//! - `true` が送られたら停止
//! - Sender を drop しても停止（誰も止められなくなったため）
//!
//! fetch と handler 実行はこの future と select して、停止要求で打ち切る。

use std::future::Future;

use tokio::sync::watch;

use crate::domain::AgentError;
use crate::ports::{QueueTransport, RawMessage};

/// Resolves once shutdown has been requested.
pub async fn requested(shutdown: &mut watch::Receiver<bool>) {
    // Err は Sender が drop されたとき。どちらも停止として扱う
    let _ = shutdown.wait_for(|stop| *stop).await;
}

pub fn is_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Run `fut` unless shutdown is requested first.
pub async fn or_cancel<T, F>(shutdown: &mut watch::Receiver<bool>, fut: F) -> Result<T, AgentError>
where
    F: Future<Output = T>,
{
    if is_requested(shutdown) {
        return Err(AgentError::Cancelled);
    }
    tokio::select! {
        _ = requested(shutdown) => Err(AgentError::Cancelled),
        out = fut => Ok(out),
    }
}

/// Fetch at most one message, giving up on shutdown.
pub async fn fetch(
    transport: &dyn QueueTransport,
    queue: &str,
    requeue: bool,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<Option<RawMessage>, AgentError> {
    let fetched = or_cancel(shutdown, transport.fetch(queue, requeue)).await??;
    Ok(fetched.filter(|raw| !raw.trim().is_empty()))
}
