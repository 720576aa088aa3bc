//! `info/deployment` - 1 つの deployment の詳細
//!
//! # 合成手順
//! 1. deployment を取得
//! 2. その deployment が所有する replica set を探す（owner reference の name 一致）
//!    複数あれば replicas > 0 のものを優先し、無ければ先頭
//! 3. replica set が所有する pod を一覧し、1 件ずつ取得して restart 数と起動時刻を得る
//!
//! replica set が見つからなければ pod は空のまま返す。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::InfoRequest;
use crate::domain::{ActionKind, HandlerError, ReplicaSet};
use crate::ports::ResourceGateway;
use crate::typed::{Handler, HandlerContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaDetail {
    /// Owning replica set, empty when none was found.
    pub set_name: String,
    pub available: i32,
    pub ready: i32,
    pub total: i32,
    pub unavailable: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodDetail {
    pub name: String,
    pub restarts: i32,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDetail {
    pub name: String,
    pub namespace: String,
    pub image: String,
    pub version: String,
    pub replicas: ReplicaDetail,
    pub pods: Vec<PodDetail>,
}

/// Tag or digest part of an image reference.
///
/// `repo:tag` gives `tag`, `repo@sha256:..` gives the digest and an
/// untagged reference gives `latest`. A `:` that belongs to a registry port
/// is not a tag separator.
pub fn image_version(image: &str) -> String {
    if let Some((_, digest)) = image.split_once('@') {
        return digest.to_string();
    }
    match image.rsplit_once(':') {
        Some((_, tag)) if !tag.contains('/') => tag.to_string(),
        _ => "latest".to_string(),
    }
}

fn owned_set<'a>(sets: &'a [ReplicaSet], deployment: &str) -> Option<&'a ReplicaSet> {
    let mut owned = sets.iter().filter(|r| r.meta.is_owned_by(deployment));
    let first = owned.next()?;
    if first.replicas > 0 {
        return Some(first);
    }
    Some(owned.find(|r| r.replicas > 0).unwrap_or(first))
}

pub struct DeploymentHandler {
    gateway: Arc<dyn ResourceGateway>,
}

impl DeploymentHandler {
    async fn pods_of(&self, namespace: &str, set_name: &str) -> Result<Vec<PodDetail>, HandlerError> {
        let listed = self.gateway.list_pods(namespace).await?;
        let mut pods = Vec::new();
        for pod in listed.iter().filter(|p| p.meta.is_owned_by(set_name)) {
            let pod = self.gateway.get_pod(namespace, &pod.meta.name).await?;
            pods.push(PodDetail {
                name: pod.meta.name,
                restarts: pod.restart_count,
                started_at: pod.started_at,
            });
        }
        Ok(pods)
    }
}

#[async_trait]
impl Handler for DeploymentHandler {
    const ACTION: ActionKind = ActionKind::Info;
    const SUBTYPE: &'static str = "deployment";
    type Request = InfoRequest;
    type Body = DeploymentDetail;

    fn from_context(ctx: &HandlerContext) -> Self {
        Self {
            gateway: ctx.gateway.clone(),
        }
    }

    fn validate(&self, request: &InfoRequest) -> Result<(), HandlerError> {
        request.require_namespace()?;
        if request.name.is_empty() {
            return Err(HandlerError::invalid("name is required"));
        }
        Ok(())
    }

    async fn process(&self, request: InfoRequest) -> Result<DeploymentDetail, HandlerError> {
        let ns = request.namespace.as_str();
        let deployment = self.gateway.get_deployment(ns, &request.name).await?;
        let image = deployment.primary_image().unwrap_or_default().to_string();

        let sets = self.gateway.list_replica_sets(ns).await?;
        let set_name = owned_set(&sets, &request.name)
            .map(|r| r.meta.name.clone())
            .unwrap_or_default();

        let pods = if set_name.is_empty() {
            debug!(namespace = ns, name = %request.name, "no owned replica set");
            Vec::new()
        } else {
            self.pods_of(ns, &set_name).await?
        };

        let counts = deployment.replicas;
        Ok(DeploymentDetail {
            version: image_version(&image),
            image,
            replicas: ReplicaDetail {
                set_name,
                available: counts.available,
                ready: counts.ready,
                total: counts.total,
                unavailable: counts.unavailable,
            },
            pods,
            name: request.name,
            namespace: request.namespace,
        })
    }
}
