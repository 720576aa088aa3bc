//! namespace 単位の一覧系 handler
//!
//! 各 handler は namespace を必須とし、gateway の一覧を
//! 応答用のコンパクトな summary に写像するだけ。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::InfoRequest;
use crate::domain::{
    ActionKind, Deployment, HandlerError, Ingress, Job, Pod, ReplicaSet, Service, StatefulSet,
};
use crate::ports::{Clock, ResourceGateway};
use crate::typed::{Handler, HandlerContext};

// ---- summaries ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSummary {
    pub name: String,
    pub image: Option<String>,
    pub ready: i32,
    pub total: i32,
}

impl From<&Deployment> for DeploymentSummary {
    fn from(d: &Deployment) -> Self {
        Self {
            name: d.meta.name.clone(),
            image: d.primary_image().map(str::to_string),
            ready: d.replicas.ready,
            total: d.replicas.total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSetSummary {
    pub name: String,
    pub image: Option<String>,
    pub replicas: i32,
    pub ready_replicas: i32,
}

impl From<&ReplicaSet> for ReplicaSetSummary {
    fn from(r: &ReplicaSet) -> Self {
        Self {
            name: r.meta.name.clone(),
            image: r.image.clone(),
            replicas: r.replicas,
            ready_replicas: r.ready_replicas,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatefulSetSummary {
    pub name: String,
    pub image: Option<String>,
    pub ready_replicas: i32,
    pub current_replicas: i32,
}

impl From<&StatefulSet> for StatefulSetSummary {
    fn from(s: &StatefulSet) -> Self {
        Self {
            name: s.meta.name.clone(),
            image: s.image.clone(),
            ready_replicas: s.ready_replicas,
            current_replicas: s.current_replicas,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub name: String,
    pub image: Option<String>,
    pub completions: i32,
    pub parallelism: i32,
    pub active: i32,
    pub succeeded: i32,
    pub failed: i32,
    /// Seconds since the job started; `None` if it has not.
    pub age_seconds: Option<i64>,
}

impl JobSummary {
    fn at(job: &Job, now: DateTime<Utc>) -> Self {
        Self {
            name: job.meta.name.clone(),
            image: job.image.clone(),
            completions: job.completions,
            parallelism: job.parallelism,
            active: job.active,
            succeeded: job.succeeded,
            failed: job.failed,
            age_seconds: job
                .started_at
                .map(|t| now.signed_duration_since(t).num_seconds().max(0)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSummary {
    pub name: String,
    pub status: String,
    pub image: Option<String>,
    pub restarts: i32,
    pub started_at: Option<DateTime<Utc>>,
}

impl From<&Pod> for PodSummary {
    fn from(p: &Pod) -> Self {
        Self {
            name: p.meta.name.clone(),
            status: p.phase.clone(),
            image: p.image.clone(),
            restarts: p.restart_count,
            started_at: p.started_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub cluster_ip: String,
    /// `name.namespace:port` per exposed port.
    pub internal_endpoints: Vec<String>,
    pub external_endpoints: Vec<String>,
}

impl From<&Service> for ServiceSummary {
    fn from(s: &Service) -> Self {
        let internal_endpoints = s
            .ports
            .iter()
            .map(|port| format!("{}.{}:{}", s.meta.name, s.meta.namespace, port))
            .collect();
        Self {
            name: s.meta.name.clone(),
            service_type: s.service_type.clone(),
            cluster_ip: s.cluster_ip.clone(),
            internal_endpoints,
            external_endpoints: s.external_ips.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressSummary {
    pub name: String,
    pub hosts: Vec<String>,
    pub endpoints: Vec<String>,
}

impl From<&Ingress> for IngressSummary {
    fn from(i: &Ingress) -> Self {
        Self {
            name: i.meta.name.clone(),
            hosts: i.hosts.clone(),
            endpoints: i.load_balancer_ips.clone(),
        }
    }
}

// ---- bodies ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentsBody {
    pub namespace: String,
    pub deployments: Vec<DeploymentSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSetsBody {
    pub namespace: String,
    pub replicasets: Vec<ReplicaSetSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatefulSetsBody {
    pub namespace: String,
    pub statefulsets: Vec<StatefulSetSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsBody {
    pub namespace: String,
    pub jobs: Vec<JobSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodsBody {
    pub namespace: String,
    pub pods: Vec<PodSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicesBody {
    pub namespace: String,
    pub services: Vec<ServiceSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressesBody {
    pub namespace: String,
    pub ingresses: Vec<IngressSummary>,
}

// ---- handlers ----

pub struct DeploymentsHandler {
    gateway: Arc<dyn ResourceGateway>,
}

#[async_trait]
impl Handler for DeploymentsHandler {
    const ACTION: ActionKind = ActionKind::Info;
    const SUBTYPE: &'static str = "deployments";
    type Request = InfoRequest;
    type Body = DeploymentsBody;

    fn from_context(ctx: &HandlerContext) -> Self {
        Self {
            gateway: ctx.gateway.clone(),
        }
    }

    fn validate(&self, request: &InfoRequest) -> Result<(), HandlerError> {
        request.require_namespace()
    }

    async fn process(&self, request: InfoRequest) -> Result<DeploymentsBody, HandlerError> {
        let items = self.gateway.list_deployments(&request.namespace).await?;
        Ok(DeploymentsBody {
            deployments: items.iter().map(DeploymentSummary::from).collect(),
            namespace: request.namespace,
        })
    }
}

pub struct ReplicaSetsHandler {
    gateway: Arc<dyn ResourceGateway>,
}

#[async_trait]
impl Handler for ReplicaSetsHandler {
    const ACTION: ActionKind = ActionKind::Info;
    const SUBTYPE: &'static str = "replicasets";
    type Request = InfoRequest;
    type Body = ReplicaSetsBody;

    fn from_context(ctx: &HandlerContext) -> Self {
        Self {
            gateway: ctx.gateway.clone(),
        }
    }

    fn validate(&self, request: &InfoRequest) -> Result<(), HandlerError> {
        request.require_namespace()
    }

    async fn process(&self, request: InfoRequest) -> Result<ReplicaSetsBody, HandlerError> {
        let items = self.gateway.list_replica_sets(&request.namespace).await?;
        // scaled-down sets are old rollouts
        Ok(ReplicaSetsBody {
            replicasets: items
                .iter()
                .filter(|r| r.replicas > 0)
                .map(ReplicaSetSummary::from)
                .collect(),
            namespace: request.namespace,
        })
    }
}

pub struct StatefulSetsHandler {
    gateway: Arc<dyn ResourceGateway>,
}

#[async_trait]
impl Handler for StatefulSetsHandler {
    const ACTION: ActionKind = ActionKind::Info;
    const SUBTYPE: &'static str = "statefulsets";
    type Request = InfoRequest;
    type Body = StatefulSetsBody;

    fn from_context(ctx: &HandlerContext) -> Self {
        Self {
            gateway: ctx.gateway.clone(),
        }
    }

    fn validate(&self, request: &InfoRequest) -> Result<(), HandlerError> {
        request.require_namespace()
    }

    async fn process(&self, request: InfoRequest) -> Result<StatefulSetsBody, HandlerError> {
        let items = self.gateway.list_stateful_sets(&request.namespace).await?;
        Ok(StatefulSetsBody {
            statefulsets: items.iter().map(StatefulSetSummary::from).collect(),
            namespace: request.namespace,
        })
    }
}

pub struct JobsHandler {
    gateway: Arc<dyn ResourceGateway>,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl Handler for JobsHandler {
    const ACTION: ActionKind = ActionKind::Info;
    const SUBTYPE: &'static str = "jobs";
    type Request = InfoRequest;
    type Body = JobsBody;

    fn from_context(ctx: &HandlerContext) -> Self {
        Self {
            gateway: ctx.gateway.clone(),
            clock: ctx.clock.clone(),
        }
    }

    fn validate(&self, request: &InfoRequest) -> Result<(), HandlerError> {
        request.require_namespace()
    }

    async fn process(&self, request: InfoRequest) -> Result<JobsBody, HandlerError> {
        let items = self.gateway.list_jobs(&request.namespace).await?;
        let now = self.clock.now();
        Ok(JobsBody {
            jobs: items.iter().map(|j| JobSummary::at(j, now)).collect(),
            namespace: request.namespace,
        })
    }
}

pub struct PodsHandler {
    gateway: Arc<dyn ResourceGateway>,
}

#[async_trait]
impl Handler for PodsHandler {
    const ACTION: ActionKind = ActionKind::Info;
    const SUBTYPE: &'static str = "pods";
    type Request = InfoRequest;
    type Body = PodsBody;

    fn from_context(ctx: &HandlerContext) -> Self {
        Self {
            gateway: ctx.gateway.clone(),
        }
    }

    fn validate(&self, request: &InfoRequest) -> Result<(), HandlerError> {
        request.require_namespace()
    }

    async fn process(&self, request: InfoRequest) -> Result<PodsBody, HandlerError> {
        let items = self.gateway.list_pods(&request.namespace).await?;
        Ok(PodsBody {
            pods: items.iter().map(PodSummary::from).collect(),
            namespace: request.namespace,
        })
    }
}

pub struct ServicesHandler {
    gateway: Arc<dyn ResourceGateway>,
}

#[async_trait]
impl Handler for ServicesHandler {
    const ACTION: ActionKind = ActionKind::Info;
    const SUBTYPE: &'static str = "services";
    type Request = InfoRequest;
    type Body = ServicesBody;

    fn from_context(ctx: &HandlerContext) -> Self {
        Self {
            gateway: ctx.gateway.clone(),
        }
    }

    fn validate(&self, request: &InfoRequest) -> Result<(), HandlerError> {
        request.require_namespace()
    }

    async fn process(&self, request: InfoRequest) -> Result<ServicesBody, HandlerError> {
        let items = self.gateway.list_services(&request.namespace).await?;
        Ok(ServicesBody {
            services: items.iter().map(ServiceSummary::from).collect(),
            namespace: request.namespace,
        })
    }
}

pub struct IngressesHandler {
    gateway: Arc<dyn ResourceGateway>,
}

#[async_trait]
impl Handler for IngressesHandler {
    const ACTION: ActionKind = ActionKind::Info;
    const SUBTYPE: &'static str = "ingresses";
    type Request = InfoRequest;
    type Body = IngressesBody;

    fn from_context(ctx: &HandlerContext) -> Self {
        Self {
            gateway: ctx.gateway.clone(),
        }
    }

    fn validate(&self, request: &InfoRequest) -> Result<(), HandlerError> {
        request.require_namespace()
    }

    async fn process(&self, request: InfoRequest) -> Result<IngressesBody, HandlerError> {
        let items = self.gateway.list_ingresses(&request.namespace).await?;
        Ok(IngressesBody {
            ingresses: items.iter().map(IngressSummary::from).collect(),
            namespace: request.namespace,
        })
    }
}
