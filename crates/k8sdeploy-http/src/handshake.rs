//! OrchestratorHandshake - 起動時の認証とキュー情報の取得
//!
//! `POST {api_address}/agent` に key / secret / company_id を送り、
//! 返ってきたキュー名とキュー専用の認証情報を [`QueueAccess`] にします。
//! 失敗はすべて [`ConfigError`]（致命的）です。

use std::time::Duration;

use async_trait::async_trait;
use k8sdeploy_core::domain::{ConfigError, QueueAccess, QueueCredentials, QueueRoutes};
use k8sdeploy_core::ports::CredentialSource;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::info;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct AgentLogin<'a> {
    key: &'a str,
    secret: &'a str,
    company_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct AgentQueues {
    agent: String,
    response: String,
    #[serde(default)]
    master: String,
}

#[derive(Debug, Deserialize)]
struct AgentReply {
    queues: AgentQueues,
    queue_credentials: QueueCredentials,
}

impl From<AgentReply> for QueueAccess {
    fn from(reply: AgentReply) -> Self {
        QueueAccess {
            routes: QueueRoutes {
                work: reply.queues.agent,
                response: reply.queues.response,
                control: reply.queues.master,
            },
            credentials: reply.queue_credentials,
        }
    }
}

/// Agent login against the orchestrator API.
pub struct OrchestratorHandshake {
    client: Client,
    api_address: String,
    key: String,
    secret: String,
    company_id: String,
}

impl OrchestratorHandshake {
    pub fn new(
        api_address: impl Into<String>,
        key: impl Into<String>,
        secret: impl Into<String>,
        company_id: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("http client: {e}")))?;
        Ok(Self {
            client,
            api_address: api_address.into(),
            key: key.into(),
            secret: secret.into(),
            company_id: company_id.into(),
        })
    }

    fn login(&self) -> Result<AgentLogin<'_>, ConfigError> {
        if self.key.is_empty() {
            return Err(ConfigError::Missing("K8SDEPLOY_API_KEY"));
        }
        if self.secret.is_empty() {
            return Err(ConfigError::Missing("K8SDEPLOY_API_SECRET"));
        }
        if self.company_id.is_empty() {
            return Err(ConfigError::Missing("K8SDEPLOY_COMPANY_ID"));
        }
        Ok(AgentLogin {
            key: &self.key,
            secret: &self.secret,
            company_id: &self.company_id,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/agent", self.api_address.trim_end_matches('/'))
    }
}

#[async_trait]
impl CredentialSource for OrchestratorHandshake {
    async fn queue_access(&self) -> Result<QueueAccess, ConfigError> {
        let login = self.login()?;
        let url = self.endpoint();

        let response = self
            .client
            .post(&url)
            .json(&login)
            .send()
            .await
            .map_err(|e| ConfigError::Handshake(format!("POST {url}: {e}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ConfigError::Handshake(format!(
                "POST {url} answered {status}: {body}"
            )));
        }

        let reply: AgentReply = response
            .json()
            .await
            .map_err(|e| ConfigError::Handshake(format!("malformed reply: {e}")))?;
        let access = QueueAccess::from(reply);
        info!(
            work = %access.routes.work,
            response = %access.routes.response,
            control = %access.routes.control,
            "orchestrator handshake complete"
        );
        Ok(access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn handshake(api: &str) -> OrchestratorHandshake {
        OrchestratorHandshake::new(api, "key-1", "secret-1", "company-1").unwrap()
    }

    #[tokio::test]
    async fn reply_becomes_queue_access() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/agent"))
            .and(body_json(json!({
                "key": "key-1",
                "secret": "secret-1",
                "company_id": "company-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "queues": { "agent": "agent-42", "response": "responses", "master": "master" },
                "queue_credentials": { "key": "qk", "secret": "qs" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let access = handshake(&format!("{}/v1", server.uri()))
            .queue_access()
            .await
            .unwrap();

        assert_eq!(access.routes.work, "agent-42");
        assert_eq!(access.routes.response, "responses");
        assert_eq!(access.routes.control, "master");
        assert_eq!(access.credentials.key, "qk");
        assert_eq!(access.credentials.secret, "qs");
    }

    #[tokio::test]
    async fn trailing_slash_on_api_address_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "queues": { "agent": "a", "response": "r" },
                "queue_credentials": { "key": "k", "secret": "s" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let access = handshake(&format!("{}/", server.uri()))
            .queue_access()
            .await
            .unwrap();
        assert_eq!(access.routes.control, "");
    }

    #[tokio::test]
    async fn non_200_is_a_handshake_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = handshake(&server.uri()).queue_access().await.unwrap_err();
        assert!(matches!(err, ConfigError::Handshake(ref msg) if msg.contains("bad key")));
    }

    #[tokio::test]
    async fn malformed_reply_is_a_handshake_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "queues": {} })))
            .mount(&server)
            .await;

        let err = handshake(&server.uri()).queue_access().await.unwrap_err();
        assert!(matches!(err, ConfigError::Handshake(_)));
    }

    #[tokio::test]
    async fn missing_company_id_fails_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let source = OrchestratorHandshake::new(server.uri(), "k", "s", "").unwrap();
        let err = source.queue_access().await.unwrap_err();
        assert!(matches!(err, ConfigError::Missing("K8SDEPLOY_COMPANY_ID")));
    }
}
