//! Action - アクションの種別と handler 解決キー
//!
//! envelope の `action` はアクションファミリ（deploy / info）を、
//! `action_details.type` はファミリ内の具体的な handler を表します。
//! 2 つを合わせた [`HandlerKey`] で ActionRegistry を引きます。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Action family carried in the envelope's `action` field.
///
/// Unknown values are kept verbatim in `Other` so a routing failure can
/// report exactly what was received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    /// Cluster-mutating actions.
    Deploy,
    /// Cluster-inspecting actions.
    Info,
    Other(String),
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Deploy => "deploy",
            ActionKind::Info => "info",
            ActionKind::Other(s) => s,
        }
    }

    /// Envelope key holding this family's request object.
    pub fn details_key(&self) -> String {
        format!("{}_details", self.as_str())
    }
}

impl From<String> for ActionKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "deploy" => ActionKind::Deploy,
            "info" => ActionKind::Info,
            _ => ActionKind::Other(value),
        }
    }
}

impl From<&str> for ActionKind {
    fn from(value: &str) -> Self {
        ActionKind::from(value.to_string())
    }
}

impl From<ActionKind> for String {
    fn from(value: ActionKind) -> Self {
        match value {
            ActionKind::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(action, action_subtype)` pair used to resolve a handler constructor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    pub action: ActionKind,
    pub subtype: String,
}

impl HandlerKey {
    pub fn new(action: ActionKind, subtype: impl Into<String>) -> Self {
        Self {
            action,
            subtype: subtype.into(),
        }
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.action, self.subtype)
    }
}
