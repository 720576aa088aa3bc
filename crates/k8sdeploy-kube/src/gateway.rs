//! KubeGateway - Kubernetes API による ResourceGateway
//!
//! # 接続
//! - 通常: in-cluster 設定（ServiceAccount）
//! - development: ローカルの kubeconfig（context 指定可）
//!
//! 404 は [`GatewayError::NotFound`]、それ以外の API エラーは
//! [`GatewayError::Api`] になります。リトライはしません。

use async_trait::async_trait;
use k8s_openapi::api::apps::v1 as apps;
use k8s_openapi::api::batch::v1 as batch;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::api::networking::v1 as networking;
use k8sdeploy_core::domain::{
    ConfigError, Deployment, GatewayError, Ingress, Job, Pod, ReplicaSet, Service, StatefulSet,
};
use k8sdeploy_core::ports::ResourceGateway;
use kube::api::{ListParams, PostParams};
use kube::config::KubeConfigOptions;
use kube::{Api, Client, Config};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::mapping;

/// Resource gateway backed by a kube [`Client`].
#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
}

impl KubeGateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using in-cluster configuration, or the local kubeconfig in development.
    pub async fn connect(development: bool, context: Option<String>) -> Result<Self, ConfigError> {
        let config = if development {
            local_config(context).await?
        } else {
            Config::incluster()
                .map_err(|e| ConfigError::Gateway(format!("in-cluster config: {e}")))?
        };
        info!(cluster = %config.cluster_url, development, "kubernetes client configured");

        let client = Client::try_from(config)
            .map_err(|e| ConfigError::Gateway(format!("kubernetes client: {e}")))?;
        Ok(Self::new(client))
    }

    fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn list<K, T>(
        &self,
        kind: &'static str,
        namespace: &str,
        map: fn(&K) -> T,
    ) -> Result<Vec<T>, GatewayError>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + std::fmt::Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let list = self
            .namespaced::<K>(namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| api_error(e, kind, namespace, ""))?;
        debug!(kind, namespace, count = list.items.len(), "listed");
        Ok(list.items.iter().map(map).collect())
    }
}

async fn local_config(context: Option<String>) -> Result<Config, ConfigError> {
    match context {
        Some(context) => {
            let options = KubeConfigOptions {
                context: Some(context.clone()),
                ..Default::default()
            };
            Config::from_kubeconfig(&options)
                .await
                .map_err(|e| ConfigError::Gateway(format!("kubeconfig context {context}: {e}")))
        }
        None => Config::infer()
            .await
            .map_err(|e| ConfigError::Gateway(format!("kubeconfig: {e}"))),
    }
}

fn api_error(err: kube::Error, kind: &'static str, namespace: &str, name: &str) -> GatewayError {
    match err {
        kube::Error::Api(resp) if resp.code == 404 => GatewayError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        other => GatewayError::Api(format!("{kind} {namespace}/{name}: {other}")),
    }
}

#[async_trait]
impl ResourceGateway for KubeGateway {
    async fn list_namespaces(&self) -> Result<Vec<String>, GatewayError> {
        let api: Api<corev1::Namespace> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| GatewayError::Api(format!("namespaces: {e}")))?;
        Ok(list.items.iter().map(mapping::namespace_name).collect())
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, GatewayError> {
        self.list::<apps::Deployment, _>("deployment", namespace, mapping::deployment)
            .await
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Deployment, GatewayError> {
        let native = self
            .namespaced::<apps::Deployment>(namespace)
            .get(name)
            .await
            .map_err(|e| api_error(e, "deployment", namespace, name))?;
        Ok(mapping::deployment(&native))
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), GatewayError> {
        let namespace = deployment.meta.namespace.as_str();
        let name = deployment.meta.name.as_str();
        let api = self.namespaced::<apps::Deployment>(namespace);

        let mut native = api
            .get(name)
            .await
            .map_err(|e| api_error(e, "deployment", namespace, name))?;
        if !mapping::apply_primary_image(&mut native, deployment) {
            return Err(GatewayError::Malformed(format!(
                "deployment {namespace}/{name} has no container to update"
            )));
        }
        api.replace(name, &PostParams::default(), &native)
            .await
            .map_err(|e| api_error(e, "deployment", namespace, name))?;
        info!(namespace, name, image = ?deployment.primary_image(), "deployment replaced");
        Ok(())
    }

    async fn list_replica_sets(&self, namespace: &str) -> Result<Vec<ReplicaSet>, GatewayError> {
        self.list::<apps::ReplicaSet, _>("replicaset", namespace, mapping::replica_set)
            .await
    }

    async fn list_stateful_sets(
        &self,
        namespace: &str,
    ) -> Result<Vec<StatefulSet>, GatewayError> {
        self.list::<apps::StatefulSet, _>("statefulset", namespace, mapping::stateful_set)
            .await
    }

    async fn list_jobs(&self, namespace: &str) -> Result<Vec<Job>, GatewayError> {
        self.list::<batch::Job, _>("job", namespace, mapping::job).await
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, GatewayError> {
        self.list::<corev1::Pod, _>("pod", namespace, mapping::pod).await
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, GatewayError> {
        let native = self
            .namespaced::<corev1::Pod>(namespace)
            .get(name)
            .await
            .map_err(|e| api_error(e, "pod", namespace, name))?;
        Ok(mapping::pod(&native))
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, GatewayError> {
        self.list::<corev1::Service, _>("service", namespace, mapping::service)
            .await
    }

    async fn list_ingresses(&self, namespace: &str) -> Result<Vec<Ingress>, GatewayError> {
        self.list::<networking::Ingress, _>("ingress", namespace, mapping::ingress)
            .await
    }
}
