//! Domain model (envelope, ids, responses, cluster resources, errors).

pub mod action;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod queue;
pub mod resources;
pub mod response;

pub use self::action::{ActionKind, HandlerKey};
pub use self::envelope::{DecodeFailure, Envelope};
pub use self::errors::{
    AgentError, ConfigError, DecodeError, ErrorKind, GatewayError, HandlerError, Stage,
    TransportError,
};
pub use self::ids::RequestId;
pub use self::queue::{QueueAccess, QueueCredentials, QueueRoutes};
pub use self::resources::{
    Container, Deployment, Ingress, Job, OwnerRef, Pod, ReplicaCounts, ReplicaSet, ResourceMeta,
    Service, StatefulSet,
};
pub use self::response::{ErrorBody, MessageProperties, OutboundMessage, Response, ResponseBody};
