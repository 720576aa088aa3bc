//! Response - request_id で相関付けられた処理結果
//!
//! 成功時は handler が描画した body、失敗時は [`ErrorBody`] を返す。
//! どちらの場合も request_id は元の envelope の値をそのまま使う。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::AgentError;
use super::ids::RequestId;

/// Structured error description published instead of a success body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub request_id: RequestId,
    pub error: String,
    pub code: String,
}

impl ErrorBody {
    pub fn from_error(request_id: RequestId, err: &AgentError) -> Self {
        Self {
            request_id,
            error: err.to_string(),
            code: err.code().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Success(Value),
    Error(ErrorBody),
}

/// Result of processing one envelope, ready to be published.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub request_id: RequestId,
    pub body: ResponseBody,
}

impl Response {
    pub fn success(request_id: RequestId, body: Value) -> Self {
        Self {
            request_id,
            body: ResponseBody::Success(body),
        }
    }

    pub fn error(request_id: RequestId, err: &AgentError) -> Self {
        let body = ErrorBody::from_error(request_id.clone(), err);
        Self {
            request_id,
            body: ResponseBody::Error(body),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.body, ResponseBody::Error(_))
    }

    /// Serialized body as carried in the outbound `payload` string.
    pub fn payload(&self) -> Result<String, serde_json::Error> {
        match &self.body {
            ResponseBody::Success(v) => serde_json::to_string(v),
            ResponseBody::Error(e) => serde_json::to_string(e),
        }
    }

    pub fn to_outbound(&self, routing_key: &str) -> Result<OutboundMessage, serde_json::Error> {
        Ok(OutboundMessage {
            properties: MessageProperties {
                request_id: self.request_id.clone(),
            },
            payload_encoding: PAYLOAD_ENCODING.to_string(),
            routing_key: routing_key.to_string(),
            payload: self.payload()?,
        })
    }
}

pub const PAYLOAD_ENCODING: &str = "string";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageProperties {
    pub request_id: RequestId,
}

/// Message published to the response queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub properties: MessageProperties,
    pub payload_encoding: String,
    pub routing_key: String,
    pub payload: String,
}
