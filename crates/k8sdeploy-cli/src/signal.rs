//! OS シグナル（SIGTERM / SIGINT）を停止要求に変換
//!
//! Sender を drop すると停止扱いになるので、ハンドラの登録に失敗しても
//! Sender は手放さない。

use tokio::sync::watch;
use tracing::{error, info};

/// Wait for SIGTERM or Ctrl-C, then flip the shutdown channel.
pub async fn forward(shutdown_tx: watch::Sender<bool>) {
    wait_for_signal().await;
    // receivers may already be gone when the agent stopped on its own
    let _ = shutdown_tx.send(true);
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("received SIGTERM");
                        return;
                    }
                    _ = ctrl_c() => return,
                }
            }
            Err(e) => error!(error = %e, "failed to install SIGTERM handler, Ctrl-C only"),
        }
    }

    ctrl_c().await;
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl-C"),
        Err(e) => {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
