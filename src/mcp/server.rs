//! The central Model Context Protocol engine
//!
//! Provides JSON-RPC decoding, method routing, capability negotiation
//! (`initialize`) and the tool, resource and prompt handlers. The dispatcher
//! keeps no per-session state: every request is answered from the injected
//! registry, resource store and session manager.

use std::sync::Arc;

use rust_mcp_sdk::schema::{
    CallToolRequestParams, Implementation, InitializeResult, ListPromptsResult,
    ListResourcesResult, ListToolsResult, ProtocolVersion, ReadResourceRequestParams,
    ServerCapabilities, ServerCapabilitiesPrompts, ServerCapabilitiesResources,
    ServerCapabilitiesTools,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::domain::{
    prompts::get_prompt,
    registry::{
        CapabilityKind, CapabilityRegistry, Descriptor, PromptDescriptor, ResourceDescriptor,
        ToolDescriptor,
    },
    resources::ResourceStore,
    schema::validate,
};
use crate::errors::McpError;
use crate::mcp::rpc::{
    is_json_rpc_error, json_rpc_result, mcp_error_to_json_rpc, RequestEnvelope,
};
use crate::session::SessionManager;

pub const SUPPORTED_PROTOCOL_VERSION: &str = "2024-11-05";
pub const RESOURCE_UPDATED_NOTIFICATION: &str = "notifications/resources/updated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WriteResourceParams {
    uri: String,
    #[serde(alias = "text")]
    content: String,
}

#[derive(Debug, Deserialize)]
struct GetPromptParams {
    name: String,
    #[serde(default)]
    arguments: Option<Map<String, Value>>,
}

pub struct Dispatcher {
    identity: ServerIdentity,
    registry: Arc<CapabilityRegistry>,
    resources: Arc<ResourceStore>,
    sessions: Arc<SessionManager>,
}

impl Dispatcher {
    pub fn new(
        identity: ServerIdentity,
        registry: Arc<CapabilityRegistry>,
        resources: Arc<ResourceStore>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            identity,
            registry,
            resources,
            sessions,
        }
    }

    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    /// Parses and answers one raw JSON-RPC message. Returns `None` only for
    /// well-formed notifications; malformed envelopes are always answered.
    pub async fn handle_json_rpc_value(&self, session_id: &str, payload: Value) -> Option<Value> {
        match RequestEnvelope::parse(payload) {
            Ok(request) => {
                let is_notification = request.is_notification();
                let response = self.dispatch(session_id, request).await;
                (!is_notification).then_some(response)
            }
            Err(error_response) => Some(error_response),
        }
    }

    /// Routes a parsed request and always produces exactly one response
    /// envelope; failures are folded into the error payload.
    pub async fn dispatch(&self, session_id: &str, request: RequestEnvelope) -> Value {
        let RequestEnvelope {
            id, method, params, ..
        } = request;
        let argument_keys = audit_keys(params.as_ref());

        let response = match self.route(&method, params).await {
            Ok(result) => json_rpc_result(id, result),
            Err(err) => mcp_error_to_json_rpc(id, err),
        };

        info!(
            session_id,
            method = %method,
            params = %argument_keys,
            outcome = if is_json_rpc_error(&response) { "failure" } else { "success" },
            "mcp action audited"
        );

        response
    }

    async fn route(&self, method: &str, params: Option<Map<String, Value>>) -> Result<Value, McpError> {
        match method {
            "initialize" => self.initialize(params.as_ref()),
            "ping" => Ok(json!({})),
            "tools/list" => to_result(ListToolsResult {
                meta: None,
                next_cursor: None,
                tools: self
                    .registry
                    .list(CapabilityKind::Tools)
                    .into_iter()
                    .filter_map(Descriptor::as_tool)
                    .map(ToolDescriptor::to_tool)
                    .collect(),
            }),
            "resources/list" => to_result(ListResourcesResult {
                meta: None,
                next_cursor: None,
                resources: self
                    .registry
                    .list(CapabilityKind::Resources)
                    .into_iter()
                    .filter_map(Descriptor::as_resource)
                    .map(ResourceDescriptor::to_resource)
                    .collect(),
            }),
            "prompts/list" => to_result(ListPromptsResult {
                meta: None,
                next_cursor: None,
                prompts: self
                    .registry
                    .list(CapabilityKind::Prompts)
                    .into_iter()
                    .filter_map(Descriptor::as_prompt)
                    .map(PromptDescriptor::to_prompt)
                    .collect(),
            }),
            "tools/call" => self.call_tool(params).await,
            "resources/read" => self.read_resource(params).await,
            "resources/write" => self.write_resource(params).await,
            "prompts/get" => self.get_prompt(params),
            _ => Err(McpError::MethodNotFound(method.to_string())),
        }
    }

    fn initialize(&self, params: Option<&Map<String, Value>>) -> Result<Value, McpError> {
        let protocol_version = negotiate_protocol_version(params)?;

        to_result(InitializeResult {
            server_info: Implementation {
                name: self.identity.name.clone(),
                version: self.identity.version.clone(),
                title: None,
                description: None,
                icons: vec![],
                website_url: None,
            },
            capabilities: ServerCapabilities {
                tools: Some(ServerCapabilitiesTools {
                    list_changed: Some(false),
                }),
                resources: Some(ServerCapabilitiesResources {
                    subscribe: Some(false),
                    list_changed: Some(false),
                }),
                prompts: Some(ServerCapabilitiesPrompts {
                    list_changed: Some(false),
                }),
                ..Default::default()
            },
            protocol_version: protocol_version.into(),
            instructions: None,
            meta: None,
        })
    }

    async fn call_tool(&self, params: Option<Map<String, Value>>) -> Result<Value, McpError> {
        let tool_call: CallToolRequestParams = parse_params(params)?;
        let descriptor = self
            .registry
            .find(CapabilityKind::Tools, &tool_call.name)
            .and_then(Descriptor::as_tool)
            .ok_or_else(|| McpError::ToolNotFound(tool_call.name.clone()))?;

        let args = tool_call.arguments.unwrap_or_default();
        validate(&descriptor.input_schema, &args)?;

        let result = self.registry.invoke(&tool_call.name, &args).await?;
        to_result(result)
    }

    async fn read_resource(&self, params: Option<Map<String, Value>>) -> Result<Value, McpError> {
        let request: ReadResourceRequestParams = parse_params(params)?;
        let content = self.resources.read(&request.uri).await?;
        to_result(content.into_read_result())
    }

    async fn write_resource(&self, params: Option<Map<String, Value>>) -> Result<Value, McpError> {
        let request: WriteResourceParams = parse_params(params)?;
        self.resources.write(&request.uri, request.content).await?;

        let delivered = self
            .sessions
            .broadcast(RESOURCE_UPDATED_NOTIFICATION, json!({ "uri": request.uri }));
        info!(uri = %request.uri, delivered, "resource update broadcast");

        Ok(json!({}))
    }

    fn get_prompt(&self, params: Option<Map<String, Value>>) -> Result<Value, McpError> {
        let request: GetPromptParams = parse_params(params)?;
        let prompt = self
            .registry
            .find(CapabilityKind::Prompts, &request.name)
            .and_then(Descriptor::as_prompt)
            .ok_or_else(|| McpError::PromptNotFound(request.name.clone()))?;

        to_result(get_prompt(prompt, &request.arguments.unwrap_or_default())?)
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Map<String, Value>>) -> Result<T, McpError> {
    let Some(raw_params) = params else {
        return Err(McpError::invalid_params("params are required"));
    };

    serde_json::from_value(Value::Object(raw_params))
        .map_err(|err| McpError::invalid_params(err.to_string()))
}

fn to_result<T: Serialize>(result: T) -> Result<Value, McpError> {
    serde_json::to_value(result).map_err(|err| McpError::internal(err.to_string()))
}

/// Clients offering the supported version get it back; anything else is
/// answered with the version this server speaks.
pub fn negotiate_protocol_version(
    params: Option<&Map<String, Value>>,
) -> Result<ProtocolVersion, McpError> {
    let offered_version = params
        .and_then(|object| object.get("protocolVersion"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .ok_or_else(|| McpError::invalid_params("initialize params.protocolVersion is required"))?;

    if offered_version != SUPPORTED_PROTOCOL_VERSION {
        info!(
            offered = offered_version,
            supported = SUPPORTED_PROTOCOL_VERSION,
            "client offered unsupported protocol version"
        );
    }

    Ok(ProtocolVersion::V2024_11_05)
}

/// Top-level parameter names plus tool/prompt argument names. Values are left
/// out of the audit log since resource writes carry arbitrary user content.
pub fn audit_keys(params: Option<&Map<String, Value>>) -> Value {
    let Some(params) = params else {
        return Value::Null;
    };

    let mut summary = Map::new();
    for (key, value) in params {
        let entry = match (key.as_str(), value) {
            ("name" | "uri", Value::String(text)) => Value::String(text.clone()),
            (_, Value::Object(inner)) => {
                Value::Array(inner.keys().cloned().map(Value::String).collect())
            }
            _ => Value::String("…".to_string()),
        };
        summary.insert(key.clone(), entry);
    }
    Value::Object(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::{json, Map, Value};

    use super::{audit_keys, negotiate_protocol_version, Dispatcher, ServerIdentity};
    use crate::domain::{registry::CapabilityRegistry, resources::ResourceStore};
    use crate::mcp::rpc::RequestEnvelope;
    use crate::session::{EventSink, SessionError, SessionManager, StreamEvent};

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<StreamEvent>>,
    }

    impl EventSink for RecordingSink {
        fn send(&self, event: StreamEvent) -> Result<(), SessionError> {
            self.events.lock().expect("events lock").push(event);
            Ok(())
        }
    }

    fn dispatcher_with_sessions(sessions: Arc<SessionManager>) -> Dispatcher {
        let registry = CapabilityRegistry::with_defaults().expect("default catalog");
        let resources = ResourceStore::from_descriptors(registry.resources());
        Dispatcher::new(
            ServerIdentity::default(),
            Arc::new(registry),
            Arc::new(resources),
            sessions,
        )
    }

    fn dispatcher() -> Dispatcher {
        dispatcher_with_sessions(Arc::new(SessionManager::new()))
    }

    async fn call(dispatcher: &Dispatcher, id: Value, method: &str, params: Value) -> Value {
        let request = RequestEnvelope {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            method: method.to_string(),
            params: params.as_object().cloned(),
        };
        dispatcher.dispatch("test-session", request).await
    }

    #[tokio::test]
    async fn tools_call_success_has_matching_id_and_no_error() {
        let dispatcher = dispatcher();
        for (name, arguments) in [
            ("echo", json!({ "message": "hi" })),
            ("add", json!({ "a": 1, "b": 2 })),
            ("get_time", json!({})),
        ] {
            let response = call(
                &dispatcher,
                json!(name),
                "tools/call",
                json!({ "name": name, "arguments": arguments }),
            )
            .await;

            assert_eq!(response["id"], name);
            assert!(response.get("error").is_none(), "{name}: {response}");
            assert_eq!(response["result"]["content"][0]["type"], "text");
        }
    }

    #[tokio::test]
    async fn add_is_commutative_in_text() {
        let dispatcher = dispatcher();
        let forward = call(
            &dispatcher,
            json!(1),
            "tools/call",
            json!({ "name": "add", "arguments": { "a": 2, "b": 3 } }),
        )
        .await;
        let reverse = call(
            &dispatcher,
            json!(2),
            "tools/call",
            json!({ "name": "add", "arguments": { "a": 3, "b": 2 } }),
        )
        .await;

        assert_eq!(
            forward["result"]["content"][0]["text"],
            "The sum of 2 and 3 is 5"
        );
        assert_eq!(
            reverse["result"]["content"][0]["text"],
            "The sum of 3 and 2 is 5"
        );
    }

    #[tokio::test]
    async fn echo_validation_cites_offending_field() {
        let dispatcher = dispatcher();
        let missing = call(
            &dispatcher,
            json!(1),
            "tools/call",
            json!({ "name": "echo", "arguments": {} }),
        )
        .await;
        assert_eq!(missing["error"]["code"], -32602);
        assert!(missing["error"]["message"]
            .as_str()
            .expect("message")
            .contains("message"));
        assert_eq!(missing["error"]["data"]["code"], "missing_argument");

        let unknown = call(
            &dispatcher,
            json!(2),
            "tools/call",
            json!({ "name": "echo", "arguments": { "message": "hi", "loud": true } }),
        )
        .await;
        assert_eq!(unknown["error"]["code"], -32602);
        assert!(unknown["error"]["message"]
            .as_str()
            .expect("message")
            .contains("loud"));
        assert_eq!(unknown["error"]["data"]["details"]["field"], "loud");
    }

    #[tokio::test]
    async fn mistyped_argument_is_invalid_params() {
        let response = call(
            &dispatcher(),
            json!(1),
            "tools/call",
            json!({ "name": "add", "arguments": { "a": "2", "b": 3 } }),
        )
        .await;
        assert_eq!(response["error"]["code"], -32602);
        assert_eq!(response["error"]["data"]["code"], "type_mismatch");
        assert_eq!(response["error"]["data"]["details"]["expected"], "number");
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let response = call(
            &dispatcher(),
            json!(1),
            "tools/call",
            json!({ "name": "launch_rockets", "arguments": {} }),
        )
        .await;
        assert_eq!(response["error"]["code"], -32602);
        assert_eq!(response["error"]["data"]["code"], "tool_not_found");
    }

    #[tokio::test]
    async fn unknown_methods_are_method_not_found() {
        let dispatcher = dispatcher();
        for method in ["tools/explode", "", "initialise", "resources/delete"] {
            let response = call(&dispatcher, json!(5), method, json!({})).await;
            assert_eq!(response["error"]["code"], -32601, "{method}");
            assert_eq!(response["id"], 5);
        }
    }

    #[tokio::test]
    async fn initialize_declares_all_capabilities() {
        let response = call(
            &dispatcher(),
            json!(1),
            "initialize",
            json!({ "protocolVersion": "2024-11-05", "capabilities": {}, "clientInfo": { "name": "t", "version": "1" } }),
        )
        .await;

        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(response["result"]["serverInfo"]["name"], env!("CARGO_PKG_NAME"));
        assert!(response["result"]["capabilities"]["tools"].is_object());
        assert!(response["result"]["capabilities"]["resources"].is_object());
        assert!(response["result"]["capabilities"]["prompts"].is_object());
    }

    #[tokio::test]
    async fn initialize_without_version_is_invalid_params() {
        let response = call(&dispatcher(), json!(1), "initialize", json!({})).await;
        assert_eq!(response["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn lists_return_full_catalog() {
        let dispatcher = dispatcher();
        let tools = call(&dispatcher, json!(1), "tools/list", json!({})).await;
        let resources = call(&dispatcher, json!(2), "resources/list", json!({})).await;
        let prompts = call(&dispatcher, json!(3), "prompts/list", json!({})).await;

        assert_eq!(tools["result"]["tools"].as_array().map(Vec::len), Some(3));
        assert_eq!(tools["result"]["tools"][1]["name"], "add");
        assert_eq!(
            resources["result"]["resources"][2]["uri"],
            "file://config"
        );
        assert_eq!(
            resources["result"]["resources"][0]["mimeType"],
            "text/plain"
        );
        assert_eq!(prompts["result"]["prompts"][0]["name"], "summarize");
        assert_eq!(prompts["result"]["prompts"][0]["arguments"][1]["required"], false);
    }

    #[tokio::test]
    async fn resource_write_then_read_and_protection() {
        let dispatcher = dispatcher();

        let forbidden = call(
            &dispatcher,
            json!(1),
            "resources/write",
            json!({ "uri": "file://config", "content": "{}" }),
        )
        .await;
        assert_eq!(forbidden["error"]["code"], -32602);
        assert_eq!(forbidden["error"]["data"]["code"], "resource_write_forbidden");

        let written = call(
            &dispatcher,
            json!(2),
            "resources/write",
            json!({ "uri": "memory://scratch", "content": "hello" }),
        )
        .await;
        assert!(written.get("error").is_none());

        let read = call(
            &dispatcher,
            json!(3),
            "resources/read",
            json!({ "uri": "memory://scratch" }),
        )
        .await;
        assert_eq!(read["result"]["contents"][0]["text"], "hello");
    }

    #[tokio::test]
    async fn reading_unknown_resource_fails() {
        let response = call(
            &dispatcher(),
            json!(1),
            "resources/read",
            json!({ "uri": "memory://nothing" }),
        )
        .await;
        assert_eq!(response["error"]["code"], -32602);
        assert_eq!(response["error"]["data"]["code"], "resource_not_found");
    }

    #[tokio::test]
    async fn resource_write_notifies_open_sessions() {
        let sessions = Arc::new(SessionManager::new());
        let sink = Arc::new(RecordingSink::default());
        sessions.create(sink.clone());
        let dispatcher = dispatcher_with_sessions(Arc::clone(&sessions));

        call(
            &dispatcher,
            json!(1),
            "resources/write",
            json!({ "uri": "memory://context", "content": "{\"k\":1}" }),
        )
        .await;

        let events = sink.events.lock().expect("events lock");
        assert_eq!(events.len(), 1);
        let payload: Value = serde_json::from_str(&events[0].data).expect("notification json");
        assert_eq!(payload["method"], "notifications/resources/updated");
        assert_eq!(payload["params"]["uri"], "memory://context");
    }

    #[tokio::test]
    async fn prompts_get_renders_template() {
        let dispatcher = dispatcher();
        let plain = call(
            &dispatcher,
            json!(1),
            "prompts/get",
            json!({ "name": "summarize", "arguments": { "content": "X" } }),
        )
        .await;
        assert_eq!(
            plain["result"]["messages"][0]["content"]["text"],
            "Please summarize the following content:\n\nX"
        );

        let short = call(
            &dispatcher,
            json!(2),
            "prompts/get",
            json!({ "name": "summarize", "arguments": { "content": "X", "length": "short" } }),
        )
        .await;
        assert_eq!(
            short["result"]["messages"][0]["content"]["text"],
            "Please summarize the following content in a short format:\n\nX"
        );

        let missing = call(
            &dispatcher,
            json!(3),
            "prompts/get",
            json!({ "name": "analyze_sentiment", "arguments": {} }),
        )
        .await;
        assert_eq!(missing["error"]["code"], -32602);

        let unknown = call(&dispatcher, json!(4), "prompts/get", json!({ "name": "poem" })).await;
        assert_eq!(unknown["error"]["data"]["code"], "prompt_not_found");
    }

    #[tokio::test]
    async fn ping_returns_empty_result() {
        let response = call(&dispatcher(), json!("p"), "ping", json!({})).await;
        assert_eq!(response["result"], json!({}));
        assert_eq!(response["id"], "p");
    }

    #[tokio::test]
    async fn notifications_produce_no_response() {
        let dispatcher = dispatcher();
        let response = dispatcher
            .handle_json_rpc_value(
                "test-session",
                json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
            )
            .await;
        assert!(response.is_none());

        let invalid = dispatcher
            .handle_json_rpc_value("test-session", json!("not an object"))
            .await
            .expect("error response");
        assert_eq!(invalid["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn malformed_envelopes_without_id_are_answered_with_null_id() {
        let dispatcher = dispatcher();
        for payload in [
            json!({ "foo": "bar" }),
            json!({ "jsonrpc": "1.0", "method": "ping" }),
            json!({ "jsonrpc": "2.0", "method": 1, "params": "bar" }),
        ] {
            let response = dispatcher
                .handle_json_rpc_value("test-session", payload.clone())
                .await
                .unwrap_or_else(|| panic!("no response for {payload}"));
            assert_eq!(response["error"]["code"], -32600, "{payload}");
            assert_eq!(response.get("id"), Some(&Value::Null), "{payload}");
        }
    }

    #[tokio::test]
    async fn explicit_null_id_is_a_request_not_a_notification() {
        let response = dispatcher()
            .handle_json_rpc_value(
                "test-session",
                json!({ "jsonrpc": "2.0", "id": null, "method": "ping" }),
            )
            .await
            .expect("null id gets a response");
        assert_eq!(response.get("id"), Some(&Value::Null));
        assert_eq!(response["result"], json!({}));
    }

    #[test]
    fn negotiation_falls_back_to_supported_version() {
        let params = json!({ "protocolVersion": "2026-01-01" });
        let version = negotiate_protocol_version(params.as_object()).expect("fallback");
        assert_eq!(version, rust_mcp_sdk::schema::ProtocolVersion::V2024_11_05);

        assert!(negotiate_protocol_version(Some(&Map::new())).is_err());
        assert!(negotiate_protocol_version(None).is_err());
    }

    #[test]
    fn audit_keys_omit_argument_values() {
        let params = json!({
            "name": "echo",
            "arguments": { "message": "secret plans" }
        });
        let summary = audit_keys(params.as_object());

        assert_eq!(summary["name"], "echo");
        assert_eq!(summary["arguments"], json!(["message"]));
        assert!(!summary.to_string().contains("secret plans"));
    }
}
