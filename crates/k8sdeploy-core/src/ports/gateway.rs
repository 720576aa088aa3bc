//! ResourceGateway port - クラスタ API の抽象化
//!
//! namespace / name をキーにしたリソースの list / get / update を提供します。
//!
//! # 実装
//! - `k8sdeploy-kube`: Kubernetes API（本番用）
//! - `impls::InMemoryGateway`: 開発・テスト用

use async_trait::async_trait;

use crate::domain::{
    Deployment, GatewayError, Ingress, Job, Pod, ReplicaSet, Service, StatefulSet,
};

/// Query/mutate cluster resources.
///
/// Implementations never retry; a failed call is reported once.
#[async_trait]
pub trait ResourceGateway: Send + Sync {
    /// Names of every namespace visible to the gateway, in gateway order.
    async fn list_namespaces(&self) -> Result<Vec<String>, GatewayError>;

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, GatewayError>;

    async fn get_deployment(&self, namespace: &str, name: &str)
    -> Result<Deployment, GatewayError>;

    /// Submit a modified deployment (matched by namespace/name).
    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), GatewayError>;

    async fn list_replica_sets(&self, namespace: &str) -> Result<Vec<ReplicaSet>, GatewayError>;

    async fn list_stateful_sets(&self, namespace: &str)
    -> Result<Vec<StatefulSet>, GatewayError>;

    async fn list_jobs(&self, namespace: &str) -> Result<Vec<Job>, GatewayError>;

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, GatewayError>;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, GatewayError>;

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, GatewayError>;

    async fn list_ingresses(&self, namespace: &str) -> Result<Vec<Ingress>, GatewayError>;
}
