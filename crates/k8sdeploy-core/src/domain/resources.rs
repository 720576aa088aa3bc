//! Cluster resources as seen through a [`ResourceGateway`](crate::ports::ResourceGateway).
//!
//! These are already reduced to the fields the agent reports on; gateways map
//! the orchestrator's native objects into them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMeta {
    pub name: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owners: Vec<OwnerRef>,
}

impl ResourceMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            owners: Vec::new(),
        }
    }

    pub fn owned_by(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.owners.push(OwnerRef {
            kind: kind.into(),
            name: name.into(),
        });
        self
    }

    /// Owner-reference match by name.
    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owners.iter().any(|o| o.name == owner)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: String,
}

/// Replica status counters of a deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaCounts {
    pub total: i32,
    pub ready: i32,
    pub available: i32,
    pub unavailable: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub meta: ResourceMeta,
    pub containers: Vec<Container>,
    pub replicas: ReplicaCounts,
}

impl Deployment {
    /// Image of the first container, which is the one the agent manages.
    pub fn primary_image(&self) -> Option<&str> {
        self.containers.first().map(|c| c.image.as_str())
    }

    /// Rewrite the first container's image. Returns false if there is none.
    pub fn set_primary_image(&mut self, image: impl Into<String>) -> bool {
        match self.containers.first_mut() {
            Some(c) => {
                c.image = image.into();
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSet {
    pub meta: ResourceMeta,
    pub image: Option<String>,
    pub replicas: i32,
    pub ready_replicas: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatefulSet {
    pub meta: ResourceMeta,
    pub image: Option<String>,
    pub ready_replicas: i32,
    pub current_replicas: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub meta: ResourceMeta,
    pub image: Option<String>,
    pub completions: i32,
    pub parallelism: i32,
    pub active: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    pub meta: ResourceMeta,
    pub phase: String,
    pub image: Option<String>,
    pub restart_count: i32,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub meta: ResourceMeta,
    pub service_type: String,
    pub cluster_ip: String,
    pub ports: Vec<i32>,
    pub external_ips: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingress {
    pub meta: ResourceMeta,
    pub hosts: Vec<String>,
    pub load_balancer_ips: Vec<String>,
}
