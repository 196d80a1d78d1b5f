//! JSON-RPC envelopes and response formatting
//!
//! Requests are parsed into [`RequestEnvelope`]; responses are produced as
//! JSON values through the SDK's response types so the framing always matches
//! the protocol.

use rust_mcp_sdk::schema::{
    JsonrpcErrorResponse, JsonrpcResultResponse, RequestId, Result as McpResult, RpcError,
};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};
use tracing::error;

use crate::errors::McpError;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;

/// Inbound JSON-RPC request. A missing `id` makes it a notification; an
/// explicit `"id": null` is kept as `Some(Value::Null)` and still answered.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequestEnvelope {
    pub jsonrpc: String,
    #[serde(default, deserialize_with = "present_id")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Map<String, Value>>,
}

fn present_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl RequestEnvelope {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Rejects anything that is not a well-formed 2.0 request with a string,
    /// integer or null id. The returned value is the ready-made error response.
    pub fn parse(payload: Value) -> Result<Self, Value> {
        if !payload.is_object() {
            return Err(json_rpc_error(None, INVALID_REQUEST, "Invalid Request"));
        }

        let raw_id = payload.get("id").cloned().filter(|id| !id.is_null());
        let envelope: Self = serde_json::from_value(payload)
            .map_err(|_| json_rpc_error(raw_id.clone(), INVALID_REQUEST, "Invalid Request"))?;

        let id_is_valid = envelope
            .id
            .as_ref()
            .map_or(true, |id| id.is_null() || value_to_request_id(id).is_some());
        if envelope.jsonrpc != JSONRPC_VERSION || envelope.method.trim().is_empty() || !id_is_valid
        {
            return Err(json_rpc_error(raw_id, INVALID_REQUEST, "Invalid Request"));
        }

        Ok(envelope)
    }
}

pub fn is_json_rpc_error(value: &Value) -> bool {
    value.get("error").is_some()
}

pub fn mcp_error_to_json_rpc(id: Option<Value>, err: McpError) -> Value {
    if let McpError::Internal(detail) = &err {
        error!(error = %detail, "request failed with internal error");
        return json_rpc_error(id, err.code(), "Internal error");
    }

    let message = err.to_string();
    json_rpc_error_with_data(
        id,
        err.code(),
        &message,
        Some(json!({
            "code": err.data_code(),
            "message": message,
            "details": err.details(),
        })),
    )
}

pub fn json_rpc_error(id: Option<Value>, code: i32, message: &str) -> Value {
    json_rpc_error_with_data(id, code, message, None)
}

pub fn json_rpc_error_with_data(
    id: Option<Value>,
    code: i32,
    message: &str,
    data: Option<Value>,
) -> Value {
    let response = JsonrpcErrorResponse::new(
        RpcError {
            code: i64::from(code),
            data,
            message: message.to_string(),
        },
        id.as_ref().and_then(value_to_request_id),
    );
    let mut value =
        serde_json::to_value(response).expect("jsonrpc error response serialization");
    // Errors for requests whose id cannot be read still carry `"id": null`.
    if let Some(object) = value.as_object_mut() {
        object.entry("id").or_insert(Value::Null);
    }
    value
}

pub fn json_rpc_result(id: Option<Value>, result: Value) -> Value {
    if let Some(request_id) = id.as_ref().and_then(value_to_request_id) {
        let extra = result.as_object().cloned();
        let response = JsonrpcResultResponse::new(request_id, McpResult { meta: None, extra });
        return serde_json::to_value(response).expect("jsonrpc result response serialization");
    }

    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": Value::Null,
        "result": result
    })
}

pub fn value_to_request_id(value: &Value) -> Option<RequestId> {
    if let Some(string_id) = value.as_str() {
        return Some(RequestId::String(string_id.to_string()));
    }

    value.as_i64().map(RequestId::Integer)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use serde_json::Value;

    use super::{json_rpc_error, json_rpc_result, mcp_error_to_json_rpc, RequestEnvelope};
    use crate::errors::McpError;

    #[test]
    fn parses_request_and_notification() {
        let request = RequestEnvelope::parse(json!({
            "jsonrpc": "2.0",
            "id": "abc",
            "method": "ping"
        }))
        .expect("valid request");
        assert_eq!(request.id, Some(json!("abc")));
        assert!(!request.is_notification());

        let notification = RequestEnvelope::parse(json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))
        .expect("valid notification");
        assert!(notification.is_notification());
        assert!(notification.params.is_none());
    }

    #[test]
    fn rejects_wrong_version_with_mirrored_id() {
        let error = RequestEnvelope::parse(json!({
            "jsonrpc": "1.0",
            "id": 9,
            "method": "ping"
        }))
        .expect_err("wrong version");
        assert_eq!(error["id"], 9);
        assert_eq!(error["error"]["code"], -32600);
    }

    #[test]
    fn rejects_non_scalar_ids_and_non_object_params() {
        let bad_id = RequestEnvelope::parse(json!({
            "jsonrpc": "2.0",
            "id": { "nested": true },
            "method": "ping"
        }))
        .expect_err("object id");
        assert_eq!(bad_id["error"]["code"], -32600);

        let bad_params = RequestEnvelope::parse(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "ping",
            "params": [1, 2]
        }))
        .expect_err("array params");
        assert_eq!(bad_params["error"]["code"], -32600);
    }

    #[test]
    fn explicit_null_id_is_not_a_notification() {
        let request = RequestEnvelope::parse(json!({
            "jsonrpc": "2.0",
            "id": null,
            "method": "ping"
        }))
        .expect("null id is allowed");
        assert_eq!(request.id, Some(Value::Null));
        assert!(!request.is_notification());

        let response = json_rpc_result(request.id, json!({}));
        assert_eq!(response.get("id"), Some(&Value::Null));
    }

    #[test]
    fn unreadable_ids_are_answered_with_null_id() {
        for id in [json!(1.5), json!(u64::MAX)] {
            let error = RequestEnvelope::parse(json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": "ping"
            }))
            .expect_err("unsupported id");
            assert_eq!(error["error"]["code"], -32600);
            assert_eq!(error.get("id"), Some(&Value::Null));
        }

        let parse_error = json_rpc_error(None, -32700, "Parse error");
        assert_eq!(parse_error.get("id"), Some(&Value::Null));
    }

    #[test]
    fn result_mirrors_id() {
        let response = json_rpc_result(Some(json!(7)), json!({ "tools": [] }));
        assert_eq!(response["jsonrpc"], "2.0");
        assert_eq!(response["id"], 7);
        assert!(response["result"]["tools"].is_array());
        assert!(response.get("error").is_none());
    }

    #[test]
    fn protocol_errors_carry_message_and_data() {
        let response = mcp_error_to_json_rpc(
            Some(json!("req-1")),
            McpError::ResourceWriteForbidden("file://config".to_string()),
        );
        assert_eq!(response["id"], "req-1");
        assert_eq!(response["error"]["code"], -32602);
        assert_eq!(
            response["error"]["message"],
            "Resource is read-only: file://config"
        );
        assert_eq!(response["error"]["data"]["code"], "resource_write_forbidden");
        assert!(response.get("result").is_none());
    }

    #[test]
    fn internal_errors_hide_detail() {
        let response = mcp_error_to_json_rpc(Some(json!(1)), McpError::internal("disk on fire"));
        assert_eq!(response["error"]["code"], -32603);
        assert_eq!(response["error"]["message"], "Internal error");
        assert!(response["error"].get("data").is_none());
    }
}
