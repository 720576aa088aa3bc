//! Scheduler - 一定間隔の poll ループ
//!
//! # 1 tick の流れ
//! 1. work キューの poll を spawn（常に 1 つ）
//! 2. self-update が有効なら control キューの poll も spawn
//! 3. 共有の mpsc チャネルから、spawn した数だけ結果を受け取る
//! 4. エラーはログに残して次の tick へ（致命的なのは Config だけ）
//!
//! 同じキューに対して fetch が並行することはない（tick 内で待ち切るため）。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::control::SelfUpdater;
use super::dispatcher::Dispatcher;
use super::shutdown;
use crate::domain::{AgentError, ErrorKind};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Poll the control queue as well.
    pub self_update: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            self_update: false,
        }
    }
}

/// Which poller produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poller {
    Work,
    Control,
}

impl Poller {
    fn as_str(self) -> &'static str {
        match self {
            Poller::Work => "work",
            Poller::Control => "control",
        }
    }
}

pub type PollOutcome = (Poller, Result<(), AgentError>);

pub struct Scheduler {
    config: SchedulerConfig,
    dispatcher: Arc<Dispatcher>,
    updater: Option<Arc<SelfUpdater>>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        dispatcher: Arc<Dispatcher>,
        updater: Option<Arc<SelfUpdater>>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            updater,
        }
    }

    fn control_poller(&self) -> Option<Arc<SelfUpdater>> {
        if self.config.self_update {
            self.updater.clone()
        } else {
            None
        }
    }

    /// Run one tick: spawn the pollers and drain exactly one outcome per poller.
    pub async fn tick(&self, shutdown_rx: &watch::Receiver<bool>) -> Vec<PollOutcome> {
        let (tx, mut rx) = mpsc::channel::<PollOutcome>(2);
        let mut spawned = 0usize;

        {
            let dispatcher = Arc::clone(&self.dispatcher);
            let tx = tx.clone();
            let shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move {
                let out = dispatcher.poll_once(shutdown_rx).await;
                // receiver is alive until every spawned poller reported
                let _ = tx.send((Poller::Work, out)).await;
            });
            spawned += 1;
        }

        if let Some(updater) = self.control_poller() {
            let tx = tx.clone();
            let shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move {
                let out = updater.poll_once(shutdown_rx).await;
                let _ = tx.send((Poller::Control, out)).await;
            });
            spawned += 1;
        }
        drop(tx);

        let mut outcomes = Vec::with_capacity(spawned);
        while outcomes.len() < spawned {
            // None means a poller panicked before reporting
            let Some(outcome) = rx.recv().await else {
                warn!(expected = spawned, got = outcomes.len(), "poller exited without reporting");
                break;
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Poll on every tick until shutdown is requested.
    ///
    /// Only a fatal error ends the loop early.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> Result<(), AgentError> {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            self_update = self.control_poller().is_some(),
            "scheduler started"
        );

        loop {
            if shutdown::is_requested(&shutdown_rx) {
                break;
            }
            tokio::select! {
                _ = shutdown::requested(&mut shutdown_rx) => break,
                _ = ticker.tick() => {}
            }

            for (poller, outcome) in self.tick(&shutdown_rx).await {
                let Err(err) = outcome else { continue };
                if err.is_cancelled() {
                    debug!(poller = poller.as_str(), "poll cancelled");
                    continue;
                }
                match err.kind() {
                    ErrorKind::Fatal => return Err(err),
                    ErrorKind::Recoverable => {
                        warn!(poller = poller.as_str(), code = err.code(), error = %err, "poll cycle failed");
                    }
                }
            }
        }

        info!("scheduler stopped");
        Ok(())
    }
}
