//! Queue routing and credentials handed over by the orchestrator handshake.
//!
//! Read-only for the lifetime of the process.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical queues the agent talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRoutes {
    /// Inbound work queue.
    pub work: String,
    /// Outbound response queue.
    pub response: String,
    /// Inbound self-update/control queue.
    pub control: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCredentials {
    pub key: String,
    pub secret: String,
}

impl fmt::Debug for QueueCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueCredentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueAccess {
    pub routes: QueueRoutes,
    pub credentials: QueueCredentials,
}
