//! Domain identifiers.
//!
//! # RequestId
//! request_id は呼び出し側が発行する相関トークンです。
//! agent は中身を解釈せず、受け取った値をそのままレスポンスに載せて返すだけです。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque correlation token copied from an envelope into its response.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
