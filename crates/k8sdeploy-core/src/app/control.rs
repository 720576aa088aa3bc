//! SelfUpdater - control キューの処理（エージェント自身の更新）
//!
//! # メッセージ
//! ```json
//! { "action": "update", "version": "1.4.0" }
//! ```
//!
//! # 方針
//! - 実行中のビルドが `dev` / `latest` / 要求と同じ version ならスキップ
//! - それ以外は自分の deployment を `<container_url>:<version>` に更新する
//!   （deploy/image と同じ handler を使う）
//! - control メッセージには応答を publish しない

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::watch;
use tracing::{info, trace};

use super::shutdown;
use crate::actions::{UpdateImageHandler, UpdateImageRequest};
use crate::domain::{ActionKind, AgentError, ConfigError, DecodeError, HandlerKey};
use crate::ports::QueueTransport;
use crate::typed::{Handler, HandlerContext, TypedHandler};

const UPDATE_ACTION: &str = "update";

/// Where the agent itself runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfUpdateConfig {
    /// Version of the running build.
    pub build_version: String,
    pub name: String,
    pub namespace: String,
    pub container_url: String,
}

impl SelfUpdateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Missing("SELF_NAME"));
        }
        if self.namespace.is_empty() {
            return Err(ConfigError::Missing("SELF_NAMESPACE"));
        }
        if self.container_url.is_empty() {
            return Err(ConfigError::Missing("SELF_CONTAINER_URL"));
        }
        Ok(())
    }

    fn skip_reason(&self, version: &str) -> Option<&'static str> {
        match self.build_version.as_str() {
            "dev" => Some("development build"),
            "latest" => Some("floating build"),
            v if v == version => Some("already running requested version"),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ControlMessage {
    #[serde(default)]
    action: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    Skipped { reason: &'static str },
    Updated { image: String },
}

pub struct SelfUpdater {
    config: SelfUpdateConfig,
    context: HandlerContext,
    transport: Arc<dyn QueueTransport>,
    queue: String,
}

impl SelfUpdater {
    pub fn new(
        config: SelfUpdateConfig,
        context: HandlerContext,
        transport: Arc<dyn QueueTransport>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            config,
            context,
            transport,
            queue: queue.into(),
        }
    }

    /// Apply one control message.
    pub async fn apply(&self, raw: &str) -> Result<ControlOutcome, AgentError> {
        let msg: ControlMessage =
            serde_json::from_str(raw).map_err(|e| DecodeError::Json(e.to_string()))?;
        if msg.action != UPDATE_ACTION {
            return Err(AgentError::Routing(HandlerKey::new(
                ActionKind::from(msg.action),
                "control",
            )));
        }
        if msg.version.is_empty() {
            return Err(DecodeError::MissingField("version").into());
        }
        if let Some(reason) = self.config.skip_reason(&msg.version) {
            return Ok(ControlOutcome::Skipped { reason });
        }

        let request = UpdateImageRequest {
            name: self.config.name.clone(),
            namespace: self.config.namespace.clone(),
            container_url: self.config.container_url.clone(),
            hash: String::new(),
            tag: msg.version,
        };
        let image = request.image_reference().unwrap_or_default();
        TypedHandler::new(UpdateImageHandler::from_context(&self.context))
            .validate_and_process(request)
            .await?;
        Ok(ControlOutcome::Updated { image })
    }

    /// Poll the control queue and apply at most one message.
    pub async fn poll_once(&self, mut shutdown_rx: watch::Receiver<bool>) -> Result<(), AgentError> {
        let queue = self.queue.as_str();
        let Some(raw) =
            shutdown::fetch(self.transport.as_ref(), queue, false, &mut shutdown_rx).await?
        else {
            trace!(queue, "no control message");
            return Ok(());
        };

        // popped messages are applied to completion even if shutdown arrives
        match self.apply(&raw).await? {
            ControlOutcome::Skipped { reason } => {
                info!(queue, build = %self.config.build_version, reason, "self-update skipped");
            }
            ControlOutcome::Updated { image } => {
                info!(queue, image = %image, "self-update rolled out");
            }
        }
        Ok(())
    }
}
