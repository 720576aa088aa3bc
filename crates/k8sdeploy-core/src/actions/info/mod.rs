//! info ファミリ - クラスタを参照する action
//!
//! すべての subtype が同じ `info_details` 形（namespace / name）を受け取る。
//!
//! | subtype | 必須 | 応答 |
//! |---|---|---|
//! | namespaces | - | `namespaces` |
//! | deployments | namespace | `deployments` |
//! | deployment | namespace, name | 詳細（replica set と pod を合成） |
//! | replicasets | namespace | `replicasets` |
//! | statefulsets | namespace | `statefulsets` |
//! | jobs | namespace | `jobs` |
//! | pods | namespace | `pods` |
//! | services | namespace | `services` |
//! | ingresses | namespace | `ingresses` |

pub mod deployment;
pub mod namespaces;
pub mod workloads;

use serde::{Deserialize, Serialize};

use crate::domain::HandlerError;

pub use self::deployment::{DeploymentDetail, DeploymentHandler, image_version};
pub use self::namespaces::NamespacesHandler;
pub use self::workloads::{
    DeploymentsHandler, IngressesHandler, JobsHandler, PodsHandler, ReplicaSetsHandler,
    ServicesHandler, StatefulSetsHandler,
};

/// `info_details` of every info envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoRequest {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
}

impl InfoRequest {
    pub fn in_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: String::new(),
        }
    }

    pub(crate) fn require_namespace(&self) -> Result<(), HandlerError> {
        if self.namespace.is_empty() {
            return Err(HandlerError::invalid("namespace is required"));
        }
        Ok(())
    }
}
