//! Errors - エラー型と分類
//!
//! # 分類
//! - **Fatal**: 起動時の設定エラー（ループを開始できない）
//! - **Recoverable**: 1 サイクル分の処理失敗（ログに残して次の tick へ）
//!
//! 自動リトライはどこにも無い。失敗したメッセージは一度だけ報告される。

use std::fmt;

use thiserror::Error;

use super::action::HandlerKey;

/// Operational classification of an [`AgentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fatal,
    Recoverable,
}

/// Startup configuration failures. Always fatal.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("orchestrator handshake failed: {0}")]
    Handshake(String),

    #[error("resource gateway unavailable: {0}")]
    Gateway(String),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Queue fetch/publish failures.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request to queue {queue} failed: {reason}")]
    Request { queue: String, reason: String },

    #[error("queue {queue} answered {status}: {body}")]
    Status {
        queue: String,
        status: u16,
        body: String,
    },

    #[error("malformed reply from queue {queue}: {reason}")]
    Decode { queue: String, reason: String },

    #[error("message for {0} was not routed")]
    NotRouted(String),
}

/// Malformed envelope.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("message is not valid json: {0}")]
    Json(String),

    #[error("message is not a json object")]
    NotAnObject,

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Cluster API failures reported by a resource gateway.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("cluster api error: {0}")]
    Api(String),

    #[error("unexpected resource shape: {0}")]
    Malformed(String),
}

/// Failures raised inside a handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("failed to render response: {0}")]
    Render(#[from] serde_json::Error),
}

impl HandlerError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        HandlerError::InvalidRequest(reason.into())
    }
}

/// Handler lifecycle stage a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validation,
    Execution,
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Validation => "validation",
            Stage::Execution => "execution",
            Stage::Render => "render",
        };
        f.write_str(s)
    }
}

/// Top-level error of the dispatch core.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("decode: {0}")]
    Decode(#[from] DecodeError),

    #[error("no handler registered for {0}")]
    Routing(HandlerKey),

    #[error("{stage} failed: {source}")]
    Handler {
        stage: Stage,
        #[source]
        source: HandlerError,
    },

    #[error("shutdown requested")]
    Cancelled,
}

impl AgentError {
    pub fn handler(stage: Stage, source: HandlerError) -> Self {
        AgentError::Handler { stage, source }
    }

    /// Only configuration problems stop the agent.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Config(_) => ErrorKind::Fatal,
            _ => ErrorKind::Recoverable,
        }
    }

    /// Stable code carried in error response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::Config(_) => "config_error",
            AgentError::Transport(_) => "transport_error",
            AgentError::Decode(_) => "decode_error",
            AgentError::Routing(_) => "routing_error",
            AgentError::Handler { source, .. } => match source {
                HandlerError::InvalidRequest(_) => "invalid_request",
                HandlerError::Gateway(_) => "gateway_error",
                HandlerError::Render(_) => "render_error",
            },
            AgentError::Cancelled => "cancelled",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AgentError::Cancelled)
    }
}
