//! RabbitHttpTransport - RabbitMQ management HTTP API による QueueTransport
//!
//! # エンドポイント
//! - fetch: `POST {host}/api/queues/{vhost}/{queue}/get`
//! - publish: `POST {host}/api/exchanges/{vhost}/amq.default/publish`
//!
//! fetch の ack モードはリクエストの `ackmode` で決まるので、
//! 取り出しと ack が 1 回の呼び出しで完結する。

use std::time::Duration;

use async_trait::async_trait;
use k8sdeploy_core::domain::{ConfigError, OutboundMessage, QueueCredentials, TransportError};
use k8sdeploy_core::ports::{QueueTransport, RawMessage};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_EXCHANGE: &str = "amq.default";
const TRUNCATE_BYTES: u32 = 50_000;

#[derive(Debug, Serialize)]
struct GetRequest {
    ackmode: &'static str,
    count: u32,
    encoding: &'static str,
    truncate: u32,
}

impl GetRequest {
    fn one(requeue: bool) -> Self {
        Self {
            ackmode: if requeue {
                "ack_requeue_true"
            } else {
                "ack_requeue_false"
            },
            count: 1,
            encoding: "auto",
            truncate: TRUNCATE_BYTES,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FetchedMessage {
    payload: String,
    #[serde(default)]
    message_count: u64,
}

#[derive(Debug, Deserialize)]
struct PublishReply {
    routed: bool,
}

/// Queue transport over the management plugin's HTTP API.
pub struct RabbitHttpTransport {
    client: Client,
    base: Url,
    vhost: String,
    credentials: QueueCredentials,
}

impl RabbitHttpTransport {
    /// `host` is the management API base, e.g. `http://rabbit:15672`.
    pub fn new(
        host: &str,
        vhost: impl Into<String>,
        credentials: QueueCredentials,
    ) -> Result<Self, ConfigError> {
        let base = Url::parse(host)
            .map_err(|e| ConfigError::Invalid(format!("queue host {host:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!("queue host {host:?} is not a base url")));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base,
            vhost: vhost.into(),
            credentials,
        })
    }

    /// Append percent-encoded path segments (a vhost of `/` becomes `%2F`).
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        queue: &str,
        url: Url,
        body: &B,
    ) -> Result<String, TransportError> {
        let response = self
            .client
            .post(url)
            .basic_auth(&self.credentials.key, Some(&self.credentials.secret))
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Request {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| TransportError::Request {
            queue: queue.to_string(),
            reason: format!("failed to read body: {e}"),
        })?;
        if !status.is_success() {
            return Err(TransportError::Status {
                queue: queue.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

fn decode<T: for<'de> Deserialize<'de>>(queue: &str, text: &str) -> Result<T, TransportError> {
    serde_json::from_str(text).map_err(|e| TransportError::Decode {
        queue: queue.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl QueueTransport for RabbitHttpTransport {
    async fn fetch(
        &self,
        queue: &str,
        requeue: bool,
    ) -> Result<Option<RawMessage>, TransportError> {
        let url = self.endpoint(&["api", "queues", self.vhost.as_str(), queue, "get"]);
        let text = self.post(queue, url, &GetRequest::one(requeue)).await?;

        let messages: Vec<FetchedMessage> = decode(queue, &text)?;
        let Some(message) = messages.into_iter().next() else {
            trace!(queue, "queue empty");
            return Ok(None);
        };
        debug!(queue, remaining = message.message_count, "message fetched");
        Ok(Some(message.payload))
    }

    async fn publish(&self, queue: &str, message: &OutboundMessage) -> Result<(), TransportError> {
        let url = self.endpoint(&["api", "exchanges", self.vhost.as_str(), DEFAULT_EXCHANGE, "publish"]);
        let text = self.post(queue, url, message).await?;

        let reply: PublishReply = decode(queue, &text)?;
        if !reply.routed {
            return Err(TransportError::NotRouted(queue.to_string()));
        }
        debug!(queue, request_id = %message.properties.request_id, "message published");
        Ok(())
    }
}
