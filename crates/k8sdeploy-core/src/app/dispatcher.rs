//! Dispatcher - 生メッセージ 1 件を 0 または 1 件の応答に変える
//!
//! # フロー
//! 1. decode: 生文字列 → Envelope（失敗しても request_id が取れていれば応答する）
//! 2. route: (action, subtype) で ActionRegistry を引く
//! 3. execute: handler を新しく作り、payload を渡して validate + process
//! 4. respond: 成功 body かエラー body を request_id 付きで作る
//! 5. publish: 応答キューへ送る（失敗してもやり直さない）

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, trace, warn};

use super::shutdown;
use crate::domain::{AgentError, Envelope, HandlerError, QueueRoutes, Response, Stage};
use crate::ports::QueueTransport;
use crate::typed::{ActionRegistry, HandlerContext};

/// Result of dispatching one raw message.
#[derive(Debug)]
pub struct Dispatched {
    /// Response to publish; `None` only when no request_id could be recovered.
    pub response: Option<Response>,
    /// Why processing failed, if it did.
    pub failure: Option<AgentError>,
}

impl Dispatched {
    fn succeeded(response: Response) -> Self {
        Self {
            response: Some(response),
            failure: None,
        }
    }

    fn failed(response: Option<Response>, failure: AgentError) -> Self {
        Self {
            response,
            failure: Some(failure),
        }
    }
}

/// Dispatcher は work キューの 1 サイクル（fetch → dispatch → publish）を担う
///
/// registry と context は起動後は読み取り専用で、すべての poll で共有する。
pub struct Dispatcher {
    registry: Arc<ActionRegistry>,
    context: HandlerContext,
    transport: Arc<dyn QueueTransport>,
    routes: QueueRoutes,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ActionRegistry>,
        context: HandlerContext,
        transport: Arc<dyn QueueTransport>,
        routes: QueueRoutes,
    ) -> Self {
        Self {
            registry,
            context,
            transport,
            routes,
        }
    }

    /// Decode, route and execute one raw message. Never publishes.
    pub async fn dispatch(&self, raw: &str) -> Dispatched {
        let envelope = match Envelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(failure) => {
                let err = AgentError::Decode(failure.error);
                let response = failure.request_id.map(|id| Response::error(id, &err));
                return Dispatched::failed(response, err);
            }
        };

        let key = envelope.key();
        let request_id = envelope.request_id().clone();
        let Some(handler) = self.registry.construct(&key, &self.context) else {
            let err = AgentError::Routing(key);
            return Dispatched::failed(Some(Response::error(request_id, &err)), err);
        };

        debug!(request_id = %request_id, action = %key, "dispatching");
        match handler.handle_dyn(envelope.into_payload(), &request_id).await {
            Ok(body) => Dispatched::succeeded(Response::success(request_id, body)),
            Err(err) => Dispatched::failed(Some(Response::error(request_id, &err)), err),
        }
    }

    /// Send a response to the response queue.
    pub async fn publish(&self, response: &Response) -> Result<(), AgentError> {
        let queue = self.routes.response.as_str();
        let message = response
            .to_outbound(queue)
            .map_err(|e| AgentError::handler(Stage::Render, HandlerError::Render(e)))?;
        self.transport.publish(queue, &message).await?;
        Ok(())
    }

    /// Poll the work queue and fully process at most one message.
    ///
    /// `Ok(())` when the queue was empty or the message succeeded. A failed
    /// message is still answered when possible, then reported as `Err`.
    ///
    /// Shutdown is honored only while waiting for a message. Once a message
    /// is popped it is dispatched and answered to completion.
    pub async fn poll_once(&self, mut shutdown_rx: watch::Receiver<bool>) -> Result<(), AgentError> {
        let queue = self.routes.work.as_str();
        let Some(raw) =
            shutdown::fetch(self.transport.as_ref(), queue, false, &mut shutdown_rx).await?
        else {
            trace!(queue, "no message");
            return Ok(());
        };

        let dispatched = self.dispatch(&raw).await;

        if let Some(response) = &dispatched.response {
            if let Err(err) = self.publish(response).await {
                if let Some(failure) = &dispatched.failure {
                    warn!(queue, request_id = %response.request_id, error = %failure, "message failed");
                }
                return Err(err);
            }
            debug!(queue, request_id = %response.request_id, error = response.is_error(), "response published");
        }

        match dispatched.failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::register_builtin;
    use crate::domain::{
        Container, Deployment, GatewayError, OutboundMessage, ResourceMeta, TransportError,
    };
    use crate::impls::{InMemoryGateway, InMemoryQueueTransport};
    use crate::ports::SystemClock;
    use serde_json::{Value, json};

    const WORK: &str = "agent-work";
    const RESPONSES: &str = "agent-responses";

    struct Fixture {
        gateway: Arc<InMemoryGateway>,
        transport: Arc<InMemoryQueueTransport>,
        dispatcher: Dispatcher,
        shutdown: watch::Sender<bool>,
        rx: watch::Receiver<bool>,
    }

    fn fixture(gateway: InMemoryGateway) -> Fixture {
        let gateway = Arc::new(gateway);
        let transport = Arc::new(InMemoryQueueTransport::new());
        let mut registry = ActionRegistry::new();
        register_builtin(&mut registry).unwrap();

        let dispatcher = Dispatcher::new(
            Arc::new(registry),
            HandlerContext::new(gateway.clone(), Arc::new(SystemClock)),
            transport.clone(),
            QueueRoutes {
                work: WORK.to_string(),
                response: RESPONSES.to_string(),
                control: "agent-control".to_string(),
            },
        );
        let (tx, rx) = watch::channel(false);
        Fixture {
            gateway,
            transport,
            dispatcher,
            shutdown: tx,
            rx,
        }
    }

    fn payload(msg: &OutboundMessage) -> Value {
        serde_json::from_str(&msg.payload).unwrap()
    }

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

    #[tokio::test]
    async fn test_registered_envelope_gets_one_correlated_response() {
        let f = fixture(InMemoryGateway::new().with_namespaces(["a", "b"]));
        f.transport.push(
            WORK,
            json!({
                "action": "info",
                "request_id": "r-1",
                "action_details": { "type": "namespaces" }
            })
            .to_string(),
        );

        f.dispatcher.poll_once(f.rx.clone()).await.unwrap();

        let published = f.transport.published(RESPONSES);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].properties.request_id.as_str(), "r-1");
        assert_eq!(published[0].routing_key, RESPONSES);
        assert_eq!(payload(&published[0])["namespaces"], json!(["a", "b"]));
        assert!(f.transport.is_empty(WORK));
    }

    #[tokio::test]
    async fn test_unregistered_pair_never_touches_gateway() {
        let f = fixture(InMemoryGateway::new());
        f.transport.push(
            WORK,
            json!({
                "action": "info",
                "request_id": "r-2",
                "action_details": { "type": "nodes" }
            })
            .to_string(),
        );

        let err = f.dispatcher.poll_once(f.rx.clone()).await.unwrap_err();

        assert!(matches!(err, AgentError::Routing(_)));
        assert_eq!(f.gateway.calls(), 0);
        let published = f.transport.published(RESPONSES);
        assert_eq!(published.len(), 1);
        let body = payload(&published[0]);
        assert_eq!(body["request_id"], "r-2");
        assert_eq!(body["code"], "routing_error");
        assert!(body["error"].as_str().unwrap().contains("info/nodes"));
    }

    #[tokio::test]
    async fn test_unknown_action_family_is_a_routing_error() {
        let f = fixture(InMemoryGateway::new());
        let out = f
            .dispatcher
            .dispatch(r#"{"action":"delete","request_id":"r-3","action_details":{"type":"image"}}"#)
            .await;

        assert!(matches!(out.failure, Some(AgentError::Routing(_))));
        assert!(out.response.unwrap().is_error());
    }

    #[tokio::test]
    async fn test_decode_failure_keeps_recovered_request_id() {
        let f = fixture(InMemoryGateway::new());
        let out = f.dispatcher.dispatch(r#"{"request_id":"r-4","action_details":{"type":"pods"}}"#).await;

        assert!(matches!(out.failure, Some(AgentError::Decode(_))));
        let response = out.response.unwrap();
        assert_eq!(response.request_id.as_str(), "r-4");
        assert!(response.is_error());
    }

    #[tokio::test]
    async fn test_garbage_is_consumed_without_response() {
        let f = fixture(InMemoryGateway::new());
        f.transport.push(WORK, "not json at all");

        let err = f.dispatcher.poll_once(f.rx.clone()).await.unwrap_err();

        assert_eq!(err.code(), "decode_error");
        assert!(f.transport.published(RESPONSES).is_empty());
        assert!(f.transport.is_empty(WORK));
    }

    #[tokio::test]
    async fn test_empty_queue_is_a_silent_success() {
        let f = fixture(InMemoryGateway::new());
        f.dispatcher.poll_once(f.rx.clone()).await.unwrap();
        assert!(f.transport.published(RESPONSES).is_empty());
        assert_eq!(f.transport.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_update_image_end_to_end() {
        let f = fixture(InMemoryGateway::new().with_deployment(web()));
        f.transport.push(
            WORK,
            json!({
                "action": "deploy",
                "request_id": "r-5",
                "action_details": { "type": "image" },
                "deploy_details": {
                    "name": "web",
                    "namespace": "prod",
                    "container_url": "registry.example.com/web",
                    "tag": "v2"
                }
            })
            .to_string(),
        );

        f.dispatcher.poll_once(f.rx.clone()).await.unwrap();

        let updated = f.gateway.updates();
        assert_eq!(updated[0].primary_image(), Some("registry.example.com/web:v2"));
        let body = payload(&f.transport.published(RESPONSES)[0]);
        assert_eq!(body["updated"], true);
        assert_eq!(body["request_id"], "r-5");
        assert!(body["update_time"].is_string());
    }

    #[tokio::test]
    async fn test_missing_details_fail_validation_with_request_id() {
        let f = fixture(InMemoryGateway::new().with_deployment(web()));
        let out = f
            .dispatcher
            .dispatch(r#"{"action":"deploy","request_id":"r-6","action_details":{"type":"image"}}"#)
            .await;

        let err = out.failure.unwrap();
        assert_eq!(err.code(), "invalid_request");
        assert!(err.to_string().starts_with("validation failed"));
        assert_eq!(out.response.unwrap().request_id.as_str(), "r-6");
        assert_eq!(f.gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_reported_with_cause() {
        let f = fixture(InMemoryGateway::new());
        f.gateway.fail_with(GatewayError::Api("etcd timeout".to_string()));
        let out = f
            .dispatcher
            .dispatch(r#"{"action":"info","request_id":"r-7","action_details":{"type":"namespaces"}}"#)
            .await;

        let err = out.failure.unwrap();
        assert_eq!(err.code(), "gateway_error");
        assert!(err.to_string().contains("etcd timeout"));
    }

    #[tokio::test]
    async fn test_publish_failure_is_terminal() {
        let f = fixture(InMemoryGateway::new().with_namespaces(["a"]));
        f.transport.fail_publish(TransportError::NotRouted(RESPONSES.to_string()));
        f.transport.push(
            WORK,
            r#"{"action":"info","request_id":"r-8","action_details":{"type":"namespaces"}}"#,
        );

        let err = f.dispatcher.poll_once(f.rx.clone()).await.unwrap_err();

        assert!(matches!(err, AgentError::Transport(TransportError::NotRouted(_))));
        assert_eq!(f.gateway.calls(), 1);
        assert!(f.transport.is_empty(WORK));
    }

    #[tokio::test]
    async fn test_numbers_survive_the_wire() {
        let f = fixture(InMemoryGateway::new().with_deployment(Deployment {
            replicas: crate::domain::ReplicaCounts {
                total: i32::MAX,
                ready: 2_147_483_000,
                available: 0,
                unavailable: -1,
            },
            ..web()
        }));
        let out = f
            .dispatcher
            .dispatch(
                r#"{"action":"info","request_id":"r-9","action_details":{"type":"deployment"},
                    "info_details":{"namespace":"prod","name":"web"}}"#,
            )
            .await;
        let response = out.response.unwrap();
        let msg = response.to_outbound(RESPONSES).unwrap();

        let wire = serde_json::to_string(&msg).unwrap();
        let back: OutboundMessage = serde_json::from_str(&wire).unwrap();
        let body = payload(&back);
        assert_eq!(back.properties.request_id.as_str(), "r-9");
        assert_eq!(body["request_id"], "r-9");
        assert_eq!(body["replicas"]["total"], json!(i32::MAX));
        assert_eq!(body["replicas"]["ready"], json!(2_147_483_000));
        assert_eq!(body["replicas"]["unavailable"], json!(-1));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_before_fetch() {
        let f = fixture(InMemoryGateway::new());
        f.transport.push(
            WORK,
            r#"{"action":"info","request_id":"r-10","action_details":{"type":"namespaces"}}"#,
        );
        f.shutdown.send(true).unwrap();

        let err = f.dispatcher.poll_once(f.rx.clone()).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(f.transport.len(WORK), 1);
    }

    #[tokio::test]
    async fn test_shutdown_during_dispatch_still_answers() {
        let f = fixture(
            InMemoryGateway::new()
                .with_deployment(web())
                .with_update_latency(std::time::Duration::from_millis(200)),
        );
        f.transport.push(
            WORK,
            json!({
                "action": "deploy",
                "request_id": "r-11",
                "action_details": { "type": "image" },
                "deploy_details": {
                    "name": "web",
                    "namespace": "prod",
                    "container_url": "registry.example.com/web",
                    "tag": "v3"
                }
            })
            .to_string(),
        );

        let poll = f.dispatcher.poll_once(f.rx.clone());
        let stop = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            f.shutdown.send(true).unwrap();
        };
        let (out, ()) = tokio::join!(poll, stop);

        out.unwrap();
        assert_eq!(f.gateway.updates().len(), 1);
        assert!(f.transport.is_empty(WORK));
        let published = f.transport.published(RESPONSES);
        assert_eq!(published.len(), 1);
        assert_eq!(payload(&published[0])["request_id"], "r-11");
        assert_eq!(payload(&published[0])["updated"], true);
    }

    #[tokio::test]
    async fn test_successful_envelope_is_answered_once() {
        let f = fixture(InMemoryGateway::new().with_namespaces(["a"]));
        f.transport.push(
            WORK,
            r#"{"action":"info","request_id":"r-12","action_details":{"type":"namespaces"}}"#,
        );

        for _ in 0..3 {
            f.dispatcher.poll_once(f.rx.clone()).await.unwrap();
        }

        assert_eq!(f.transport.published(RESPONSES).len(), 1);
        assert_eq!(f.transport.fetch_count(), 3);
        assert!(f.transport.is_empty(WORK));
    }
}
