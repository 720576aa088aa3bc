//! Actions - 組み込みの handler 群
//!
//! - `deploy`: クラスタを変更する（deploy/image）
//! - `info`: クラスタを参照する（namespaces, deployments, ...）

pub mod deploy;
pub mod info;

use crate::domain::HandlerKey;
use crate::typed::{ActionRegistry, Handler, RegistryError};

pub use self::deploy::{UpdateImageBody, UpdateImageHandler, UpdateImageRequest};
pub use self::info::{
    DeploymentHandler, DeploymentsHandler, InfoRequest, IngressesHandler, JobsHandler,
    NamespacesHandler, PodsHandler, ReplicaSetsHandler, ServicesHandler, StatefulSetsHandler,
};

/// Register every built-in action.
pub fn register_builtin(registry: &mut ActionRegistry) -> Result<(), RegistryError> {
    registry.register::<UpdateImageHandler>()?;
    registry.register::<NamespacesHandler>()?;
    registry.register::<DeploymentsHandler>()?;
    registry.register::<DeploymentHandler>()?;
    registry.register::<ReplicaSetsHandler>()?;
    registry.register::<StatefulSetsHandler>()?;
    registry.register::<JobsHandler>()?;
    registry.register::<PodsHandler>()?;
    registry.register::<ServicesHandler>()?;
    registry.register::<IngressesHandler>()?;
    Ok(())
}

/// Keys [`register_builtin`] provides, for `AgentBuilder::expect_actions`.
pub fn builtin_keys() -> Vec<HandlerKey> {
    vec![
        UpdateImageHandler::key(),
        NamespacesHandler::key(),
        DeploymentsHandler::key(),
        DeploymentHandler::key(),
        ReplicaSetsHandler::key(),
        StatefulSetsHandler::key(),
        JobsHandler::key(),
        PodsHandler::key(),
        ServicesHandler::key(),
        IngressesHandler::key(),
    ]
}
