//! deploy ファミリ - クラスタを変更する action
//!
//! - `deploy/image`: deployment の先頭コンテナのイメージを差し替える
//!
//! # イメージ参照の決め方
//! hash と tag の両方があれば hash を優先する。
//! `sha256:...` のように `:` を含む hash は `@` で、それ以外は `:` で連結する。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{ActionKind, GatewayError, HandlerError};
use crate::ports::{Clock, ResourceGateway};
use crate::typed::{Handler, HandlerContext};

/// `deploy_details` of a `deploy/image` envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateImageRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub container_url: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub tag: String,
}

impl UpdateImageRequest {
    /// Full image reference, or `None` when neither hash nor tag is set.
    pub fn image_reference(&self) -> Option<String> {
        if !self.hash.is_empty() {
            let sep = if self.hash.contains(':') { '@' } else { ':' };
            return Some(format!("{}{}{}", self.container_url, sep, self.hash));
        }
        if !self.tag.is_empty() {
            return Some(format!("{}:{}", self.container_url, self.tag));
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateImageBody {
    pub updated: bool,
    pub update_time: DateTime<Utc>,
}

pub struct UpdateImageHandler {
    gateway: Arc<dyn ResourceGateway>,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl Handler for UpdateImageHandler {
    const ACTION: ActionKind = ActionKind::Deploy;
    const SUBTYPE: &'static str = "image";
    type Request = UpdateImageRequest;
    type Body = UpdateImageBody;

    fn from_context(ctx: &HandlerContext) -> Self {
        Self {
            gateway: ctx.gateway.clone(),
            clock: ctx.clock.clone(),
        }
    }

    fn validate(&self, request: &UpdateImageRequest) -> Result<(), HandlerError> {
        if request.name.is_empty() {
            return Err(HandlerError::invalid("name is required"));
        }
        if request.namespace.is_empty() {
            return Err(HandlerError::invalid("namespace is required"));
        }
        if request.container_url.is_empty() {
            return Err(HandlerError::invalid("container_url is required"));
        }
        if request.hash.is_empty() && request.tag.is_empty() {
            return Err(HandlerError::invalid("hash or tag is required"));
        }
        Ok(())
    }

    async fn process(&self, request: UpdateImageRequest) -> Result<UpdateImageBody, HandlerError> {
        let image = request
            .image_reference()
            .ok_or_else(|| HandlerError::invalid("hash or tag is required"))?;

        let mut deployment = self
            .gateway
            .get_deployment(&request.namespace, &request.name)
            .await?;
        if !deployment.set_primary_image(image.as_str()) {
            return Err(GatewayError::Malformed(format!(
                "deployment {}/{} has no containers",
                request.namespace, request.name
            ))
            .into());
        }
        self.gateway.update_deployment(&deployment).await?;

        info!(
            namespace = %request.namespace,
            name = %request.name,
            image = %image,
            "deployment image updated"
        );
        Ok(UpdateImageBody {
            updated: true,
            update_time: self.clock.now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentError, Container, Deployment, RequestId, ResourceMeta, Stage};
    use crate::impls::InMemoryGateway;
    use crate::ports::FixedClock;
    use crate::typed::{DynHandler, TypedHandler};
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    fn web() -> Deployment {
        Deployment {
            meta: ResourceMeta::new("prod", "web"),
            containers: vec![Container {
                name: "web".to_string(),
                image: "registry.example.com/web:v1".to_string(),
            }],
            ..Default::default()
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn handler(gateway: &Arc<InMemoryGateway>) -> TypedHandler<UpdateImageHandler> {
        let ctx = HandlerContext::new(gateway.clone(), Arc::new(FixedClock::new(at())));
        TypedHandler::new(UpdateImageHandler::from_context(&ctx))
    }

    fn request(tag: &str, hash: &str) -> UpdateImageRequest {
        UpdateImageRequest {
            name: "web".to_string(),
            namespace: "prod".to_string(),
            container_url: "registry.example.com/web".to_string(),
            hash: hash.to_string(),
            tag: tag.to_string(),
        }
    }

    #[tokio::test]
    async fn test_tag_rewrites_image() {
        let gateway = Arc::new(InMemoryGateway::new().with_deployment(web()));

        let processed = handler(&gateway)
            .validate_and_process(request("v2", ""))
            .await
            .unwrap();

        assert!(processed.body().updated);
        assert_eq!(processed.body().update_time, at());
        let updates = gateway.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].primary_image(), Some("registry.example.com/web:v2"));
    }

    #[rstest]
    #[case::plain_hash("abc123", "registry.example.com/web:abc123")]
    #[case::digest("sha256:9f86d0", "registry.example.com/web@sha256:9f86d0")]
    fn hash_takes_precedence_over_tag(#[case] hash: &str, #[case] expected: &str) {
        assert_eq!(request("v2", hash).image_reference().as_deref(), Some(expected));
    }

    #[rstest]
    #[case::missing_name(UpdateImageRequest { name: String::new(), ..request("v2", "") }, "name is required")]
    #[case::missing_namespace(UpdateImageRequest { namespace: String::new(), ..request("v2", "") }, "namespace is required")]
    #[case::missing_container_url(UpdateImageRequest { container_url: String::new(), ..request("v2", "") }, "container_url is required")]
    #[case::neither_tag_nor_hash(request("", ""), "hash or tag is required")]
    #[tokio::test]
    async fn invalid_requests_never_reach_the_gateway(
        #[case] req: UpdateImageRequest,
        #[case] mentions: &str,
    ) {
        let gateway = Arc::new(InMemoryGateway::new().with_deployment(web()));

        let err = handler(&gateway).validate_and_process(req).await.unwrap_err();

        assert!(matches!(
            &err,
            AgentError::Handler {
                stage: Stage::Validation,
                source: HandlerError::InvalidRequest(_)
            }
        ));
        assert!(err.to_string().contains(mentions));
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_deployment_is_a_gateway_error() {
        let gateway = Arc::new(InMemoryGateway::new());

        let err = handler(&gateway)
            .validate_and_process(request("v2", ""))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "gateway_error");
        assert!(matches!(err, AgentError::Handler { stage: Stage::Execution, .. }));
    }

    #[tokio::test]
    async fn test_reprocessing_same_envelope_reports_updated_again() {
        let gateway = Arc::new(InMemoryGateway::new().with_deployment(web()));
        let payload = json!({
            "name": "web",
            "namespace": "prod",
            "container_url": "registry.example.com/web",
            "tag": "v2"
        });

        for _ in 0..2 {
            let boxed: Box<dyn DynHandler> = Box::new(handler(&gateway));
            let out = boxed
                .handle_dyn(payload.clone(), &RequestId::new("r-9"))
                .await
                .unwrap();
            assert_eq!(out["updated"], true);
            assert_eq!(out["request_id"], "r-9");
        }
        assert_eq!(gateway.updates().len(), 2);
    }
}
