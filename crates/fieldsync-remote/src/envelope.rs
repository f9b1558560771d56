//! JSON-RPC envelopes of the unified endpoints

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use fieldsync_core::domain::FieldMap;

/// Request body: `{jsonrpc: "2.0", method: "call", params: {...}}`
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<P> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: P,
}

impl<P> RpcRequest<P> {
    pub fn call(params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            method: "call",
            params,
        }
    }
}

/// Params of a mutation submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmitParams<'a> {
    /// Remote operation name
    #[serde(rename = "type")]
    pub operation: &'a str,
    pub data: &'a FieldMap,
}

/// Params of a token exchange (none)
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmptyParams {}

/// Response body. Either `result` or `error` is expected.
///
/// `result` is `None` only when the key is absent; `"result": null` reads
/// as `Some(Value::Null)`.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default, deserialize_with = "present")]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// JSON-RPC error object
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl RpcError {
    /// Most specific message available: `data.message`, then `message`
    pub fn best_message(&self) -> String {
        self.data
            .as_ref()
            .and_then(|data| data.get("message"))
            .and_then(Value::as_str)
            .or(self.message.as_deref())
            .unwrap_or("remote error")
            .to_string()
    }
}

/// `result` of the token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// View over the `result` object of a submission response
#[derive(Debug, Clone, Copy)]
pub struct SubmitResult<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> SubmitResult<'a> {
    pub fn new(fields: &'a Map<String, Value>) -> Self {
        Self { fields }
    }

    /// `success: false` or `message_type: "error"`
    pub fn is_rejection(&self) -> bool {
        let failed = matches!(self.fields.get("success"), Some(Value::Bool(false)));
        let error_type = self.fields.get("message_type").and_then(Value::as_str) == Some("error");
        failed || error_type
    }

    pub fn message(&self) -> Option<&'a str> {
        self.fields.get("message").and_then(Value::as_str)
    }

    /// Server identifier echoed as `id`, `record_id` or `data.id`
    pub fn server_id(&self) -> Option<i64> {
        ["id", "record_id"]
            .iter()
            .find_map(|key| self.fields.get(*key).and_then(as_id))
            .or_else(|| {
                self.fields
                    .get("data")
                    .and_then(|data| data.get("id"))
                    .and_then(as_id)
            })
    }
}

fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
