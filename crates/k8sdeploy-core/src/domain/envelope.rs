//! Envelope - キューから取り出した 1 件の作業単位
//!
//! # ワイヤ形式
//! ```json
//! {
//!   "action": "deploy",
//!   "request_id": "abc",
//!   "action_details": { "type": "image" },
//!   "deploy_details": { "name": "web", "namespace": "prod", "tag": "v2" }
//! }
//! ```
//!
//! # デコード方針
//! - request_id を最初に取り出す（後続のデコードが失敗してもエラー応答を返せるように）
//! - ファミリの details は型付けせず `serde_json::Value` のまま保持し、
//!   解決された handler が自分の Request 型に再パースする
//! - 未知のフィールドは無視する

use serde_json::{Map, Value};

use super::action::{ActionKind, HandlerKey};
use super::errors::DecodeError;
use super::ids::RequestId;

/// Decoded unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    action: ActionKind,
    action_subtype: String,
    request_id: RequestId,
    payload: Value,
}

/// Decode failure plus whatever correlation id could be recovered first.
#[derive(Debug, Clone)]
pub struct DecodeFailure {
    pub request_id: Option<RequestId>,
    pub error: DecodeError,
}

impl DecodeFailure {
    fn new(request_id: Option<RequestId>, error: DecodeError) -> Self {
        Self { request_id, error }
    }
}

impl Envelope {
    #[cfg(test)]
    pub(crate) fn new(
        action: ActionKind,
        action_subtype: impl Into<String>,
        request_id: RequestId,
        payload: Value,
    ) -> Self {
        Self {
            action,
            action_subtype: action_subtype.into(),
            request_id,
            payload,
        }
    }

    /// Parse a raw queue message.
    pub fn decode(raw: &str) -> Result<Self, DecodeFailure> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| DecodeFailure::new(None, DecodeError::Json(e.to_string())))?;
        let obj = value
            .as_object()
            .ok_or_else(|| DecodeFailure::new(None, DecodeError::NotAnObject))?;

        let request_id = match obj.get("request_id") {
            Some(Value::String(s)) => RequestId::new(s.as_str()),
            Some(other) => {
                return Err(DecodeFailure::new(
                    None,
                    DecodeError::InvalidField {
                        field: "request_id",
                        reason: format!("expected a string, got {other}"),
                    },
                ));
            }
            None => {
                return Err(DecodeFailure::new(
                    None,
                    DecodeError::MissingField("request_id"),
                ));
            }
        };
        let fail = |error| DecodeFailure::new(Some(request_id.clone()), error);

        let action = obj
            .get("action")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(ActionKind::from)
            .ok_or_else(|| fail(DecodeError::MissingField("action")))?;

        let action_subtype = obj
            .get("action_details")
            .and_then(|d| d.get("type"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| fail(DecodeError::MissingField("action_details.type")))?
            .to_string();

        let payload = match obj.get(&action.details_key()) {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(details @ Value::Object(_)) => details.clone(),
            Some(other) => {
                return Err(fail(DecodeError::InvalidField {
                    field: "details",
                    reason: format!("expected an object, got {other}"),
                }));
            }
        };

        Ok(Self {
            action,
            action_subtype,
            request_id,
            payload,
        })
    }

    /// Wire form of this envelope.
    #[cfg(test)]
    pub(crate) fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("action".into(), Value::String(self.action.to_string()));
        obj.insert(
            "request_id".into(),
            Value::String(self.request_id.as_str().to_string()),
        );
        obj.insert(
            "action_details".into(),
            serde_json::json!({ "type": self.action_subtype }),
        );
        obj.insert(self.action.details_key(), self.payload.clone());
        Value::Object(obj)
    }

    pub fn key(&self) -> HandlerKey {
        HandlerKey::new(self.action.clone(), self.action_subtype.clone())
    }

    pub fn action(&self) -> &ActionKind {
        &self.action
    }

    pub fn action_subtype(&self) -> &str {
        &self.action_subtype
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }
}
