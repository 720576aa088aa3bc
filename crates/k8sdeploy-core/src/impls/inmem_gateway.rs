//! InMemoryGateway - 開発・テスト用の ResourceGateway
//!
//! # 学習ポイント
//! - RwLock による読み取り中心の共有状態
//! - AtomicUsize での呼び出し回数カウント（spy として使う）
//! - 失敗の注入で GatewayError の経路をテストする

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{
    Deployment, GatewayError, Ingress, Job, Pod, ReplicaSet, ResourceMeta, Service, StatefulSet,
};
use crate::ports::ResourceGateway;

#[derive(Default)]
struct ClusterState {
    namespaces: Vec<String>,
    deployments: Vec<Deployment>,
    replica_sets: Vec<ReplicaSet>,
    stateful_sets: Vec<StatefulSet>,
    jobs: Vec<Job>,
    pods: Vec<Pod>,
    services: Vec<Service>,
    ingresses: Vec<Ingress>,
    updates: Vec<Deployment>,
    failure: Option<GatewayError>,
}

/// InMemoryGateway は固定のクラスタ状態を返す ResourceGateway
///
/// # 使用例
/// ```ignore
/// let gateway = InMemoryGateway::new()
///     .with_namespaces(["a", "b"])
///     .with_deployment(deployment);
///
/// assert_eq!(gateway.calls(), 0);
/// ```
#[derive(Default)]
pub struct InMemoryGateway {
    state: RwLock<ClusterState>,
    calls: AtomicUsize,
    update_latency: Duration,
}

fn in_namespace<T: Clone>(items: &[T], namespace: &str, meta: fn(&T) -> &ResourceMeta) -> Vec<T> {
    items
        .iter()
        .filter(|item| meta(item).namespace == namespace)
        .cloned()
        .collect()
}

fn not_found(kind: &'static str, namespace: &str, name: &str) -> GatewayError {
    GatewayError::NotFound {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespaces<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.write().namespaces = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_deployment(self, deployment: Deployment) -> Self {
        self.write().deployments.push(deployment);
        self
    }

    pub fn with_replica_set(self, replica_set: ReplicaSet) -> Self {
        self.write().replica_sets.push(replica_set);
        self
    }

    pub fn with_stateful_set(self, stateful_set: StatefulSet) -> Self {
        self.write().stateful_sets.push(stateful_set);
        self
    }

    pub fn with_job(self, job: Job) -> Self {
        self.write().jobs.push(job);
        self
    }

    pub fn with_pod(self, pod: Pod) -> Self {
        self.write().pods.push(pod);
        self
    }

    pub fn with_service(self, service: Service) -> Self {
        self.write().services.push(service);
        self
    }

    pub fn with_ingress(self, ingress: Ingress) -> Self {
        self.write().ingresses.push(ingress);
        self
    }

    /// Delay `update_deployment` replies by `latency`, after the change is stored.
    pub fn with_update_latency(mut self, latency: Duration) -> Self {
        self.update_latency = latency;
        self
    }

    /// Make every following call fail with `err`.
    pub fn fail_with(&self, err: GatewayError) {
        self.write().failure = Some(err);
    }

    /// Number of gateway calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Deployments submitted through `update_deployment`, in call order.
    pub fn updates(&self) -> Vec<Deployment> {
        self.read().updates.clone()
    }

    // ロックが poison されても状態自体は壊れていないので中身を使う
    fn read(&self) -> RwLockReadGuard<'_, ClusterState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ClusterState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Count the call and surface an injected failure.
    fn enter(&self) -> Result<RwLockReadGuard<'_, ClusterState>, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let state = self.read();
        match &state.failure {
            Some(err) => Err(err.clone()),
            None => Ok(state),
        }
    }
}

#[async_trait]
impl ResourceGateway for InMemoryGateway {
    async fn list_namespaces(&self) -> Result<Vec<String>, GatewayError> {
        Ok(self.enter()?.namespaces.clone())
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, GatewayError> {
        Ok(in_namespace(&self.enter()?.deployments, namespace, |d| &d.meta))
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Deployment, GatewayError> {
        self.enter()?
            .deployments
            .iter()
            .find(|d| d.meta.namespace == namespace && d.meta.name == name)
            .cloned()
            .ok_or_else(|| not_found("deployment", namespace, name))
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), GatewayError> {
        drop(self.enter()?);
        {
            let mut state = self.write();
            let meta = &deployment.meta;
            let slot = state
                .deployments
                .iter_mut()
                .find(|d| d.meta.namespace == meta.namespace && d.meta.name == meta.name)
                .ok_or_else(|| not_found("deployment", &meta.namespace, &meta.name))?;
            *slot = deployment.clone();
            state.updates.push(deployment.clone());
        }
        if !self.update_latency.is_zero() {
            tokio::time::sleep(self.update_latency).await;
        }
        Ok(())
    }

    async fn list_replica_sets(&self, namespace: &str) -> Result<Vec<ReplicaSet>, GatewayError> {
        Ok(in_namespace(&self.enter()?.replica_sets, namespace, |r| &r.meta))
    }

    async fn list_stateful_sets(
        &self,
        namespace: &str,
    ) -> Result<Vec<StatefulSet>, GatewayError> {
        Ok(in_namespace(&self.enter()?.stateful_sets, namespace, |s| &s.meta))
    }

    async fn list_jobs(&self, namespace: &str) -> Result<Vec<Job>, GatewayError> {
        Ok(in_namespace(&self.enter()?.jobs, namespace, |j| &j.meta))
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, GatewayError> {
        Ok(in_namespace(&self.enter()?.pods, namespace, |p| &p.meta))
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, GatewayError> {
        self.enter()?
            .pods
            .iter()
            .find(|p| p.meta.namespace == namespace && p.meta.name == name)
            .cloned()
            .ok_or_else(|| not_found("pod", namespace, name))
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, GatewayError> {
        Ok(in_namespace(&self.enter()?.services, namespace, |s| &s.meta))
    }

    async fn list_ingresses(&self, namespace: &str) -> Result<Vec<Ingress>, GatewayError> {
        Ok(in_namespace(&self.enter()?.ingresses, namespace, |i| &i.meta))
    }
}
