//! Handler trait - envelope 1 件を処理する handler の契約
//!
//! # 二層構造
//! - **表層（Typed）**: `Handler` trait - Request / Body を型で持つ
//! - **内部（Dyn）**: `DynHandler` trait - object-safe, type erasure
//!
//! # ライフサイクル
//! 生成 → validate + process → render_response → 破棄。
//! handler は envelope ごとに新しく作られ、再利用されません。
//! render_response は process 成功時に得られる [`Processed`] にしか無いので、
//! 失敗した処理の結果を描画することは型の上で起こり得ません。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{ActionKind, AgentError, HandlerError, HandlerKey, RequestId, Stage};
use crate::ports::{Clock, ResourceGateway};

/// Shared, read-only collaborators handed to every handler constructor.
#[derive(Clone)]
pub struct HandlerContext {
    pub gateway: Arc<dyn ResourceGateway>,
    pub clock: Arc<dyn Clock>,
}

impl HandlerContext {
    pub fn new(gateway: Arc<dyn ResourceGateway>, clock: Arc<dyn Clock>) -> Self {
        Self { gateway, clock }
    }
}

/// One concrete action variant.
///
/// # 使用例
/// ```ignore
/// struct NamespacesHandler { gateway: Arc<dyn ResourceGateway> }
///
/// #[async_trait]
/// impl Handler for NamespacesHandler {
///     const ACTION: ActionKind = ActionKind::Info;
///     const SUBTYPE: &'static str = "namespaces";
///     type Request = InfoRequest;
///     type Body = NamespacesBody;
///
///     fn from_context(ctx: &HandlerContext) -> Self { ... }
///
///     async fn process(&self, _req: InfoRequest) -> Result<NamespacesBody, HandlerError> {
///         Ok(NamespacesBody { namespaces: self.gateway.list_namespaces().await? })
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    const ACTION: ActionKind;
    const SUBTYPE: &'static str;

    /// Typed shape the envelope payload is re-parsed into.
    type Request: DeserializeOwned + Send + 'static;

    /// Success body; `request_id` is added when rendering.
    type Body: Serialize + Send + 'static;

    fn from_context(ctx: &HandlerContext) -> Self
    where
        Self: Sized;

    /// Pure checks, no gateway calls.
    fn validate(&self, _request: &Self::Request) -> Result<(), HandlerError> {
        Ok(())
    }

    /// One or more gateway calls. Never retries.
    async fn process(&self, request: Self::Request) -> Result<Self::Body, HandlerError>;

    fn key() -> HandlerKey
    where
        Self: Sized,
    {
        HandlerKey::new(Self::ACTION, Self::SUBTYPE)
    }
}

/// Outcome of a successful process step.
#[derive(Debug)]
pub struct Processed<B> {
    body: B,
}

impl<B: Serialize> Processed<B> {
    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn into_body(self) -> B {
        self.body
    }

    /// Serialize the body with the correlation id embedded.
    pub fn render_response(&self, request_id: &RequestId) -> Result<Value, HandlerError> {
        let value = match serde_json::to_value(&self.body)? {
            Value::Object(mut map) => {
                map.insert(
                    "request_id".to_string(),
                    Value::String(request_id.as_str().to_string()),
                );
                Value::Object(map)
            }
            other => serde_json::json!({
                "request_id": request_id.as_str(),
                "result": other,
            }),
        };
        Ok(value)
    }
}

/// TypedHandler は Handler を所有し、段階ごとにエラーへ文脈を付ける
pub struct TypedHandler<H: Handler> {
    handler: H,
}

impl<H: Handler> TypedHandler<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    pub async fn validate_and_process(
        &self,
        request: H::Request,
    ) -> Result<Processed<H::Body>, AgentError> {
        self.handler
            .validate(&request)
            .map_err(|e| AgentError::handler(Stage::Validation, e))?;
        let body = self
            .handler
            .process(request)
            .await
            .map_err(|e| AgentError::handler(Stage::Execution, e))?;
        Ok(Processed { body })
    }
}

/// DynHandler は object-safe な Handler の抽象化
///
/// `self: Box<Self>` で消費するので、1 インスタンスは 1 回しか実行できない。
#[async_trait]
pub trait DynHandler: Send {
    async fn handle_dyn(
        self: Box<Self>,
        payload: Value,
        request_id: &RequestId,
    ) -> Result<Value, AgentError>;

    fn key(&self) -> HandlerKey;
}

#[async_trait]
impl<H: Handler> DynHandler for TypedHandler<H> {
    async fn handle_dyn(
        self: Box<Self>,
        payload: Value,
        request_id: &RequestId,
    ) -> Result<Value, AgentError> {
        let request: H::Request = serde_json::from_value(payload).map_err(|e| {
            AgentError::handler(
                Stage::Validation,
                HandlerError::invalid(format!("malformed details: {e}")),
            )
        })?;
        let processed = self.validate_and_process(request).await?;
        processed
            .render_response(request_id)
            .map_err(|e| AgentError::handler(Stage::Render, e))
    }

    fn key(&self) -> HandlerKey {
        H::key()
    }
}
