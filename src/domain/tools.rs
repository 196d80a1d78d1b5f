//! Callable tools exposed via Model Context Protocol
//!
//! Provides `echo`, `add` and `get_time`. Arguments reach the handlers already
//! checked against the declared schema.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rust_mcp_sdk::schema::{CallToolResult, ContentBlock, TextContent};
use serde_json::{Map, Number, Value};

use crate::domain::{
    registry::{ToolDescriptor, ToolHandler},
    schema::{ParamSpec, ParamType, Schema},
    utils::{add_numbers, format_number},
};
use crate::errors::McpError;

pub fn default_tools() -> Vec<(ToolDescriptor, Arc<dyn ToolHandler>)> {
    vec![
        (
            ToolDescriptor {
                name: "echo",
                description: "Echoes back the provided message",
                input_schema: Schema::new(vec![ParamSpec::required(
                    "message",
                    ParamType::String,
                    "The message to echo back",
                )]),
            },
            Arc::new(EchoTool),
        ),
        (
            ToolDescriptor {
                name: "add",
                description: "Adds two numbers together",
                input_schema: Schema::new(vec![
                    ParamSpec::required("a", ParamType::Number, "First number"),
                    ParamSpec::required("b", ParamType::Number, "Second number"),
                ]),
            },
            Arc::new(AddTool),
        ),
        (
            ToolDescriptor {
                name: "get_time",
                description: "Returns the current server time",
                input_schema: Schema::empty(),
            },
            Arc::new(GetTimeTool),
        ),
    ]
}

pub fn text_result(text: impl Into<String>) -> CallToolResult {
    CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(text.into(), None, None))],
        is_error: None,
        meta: None,
        structured_content: None,
    }
}

fn string_arg<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str, McpError> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| McpError::invalid_params(format!("argument '{name}' must be a string")))
}

fn number_arg<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a Number, McpError> {
    match args.get(name) {
        Some(Value::Number(number)) => Ok(number),
        _ => Err(McpError::invalid_params(format!(
            "argument '{name}' must be a number"
        ))),
    }
}

pub struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    async fn call(&self, args: &Map<String, Value>) -> Result<CallToolResult, McpError> {
        Ok(text_result(string_arg(args, "message")?))
    }
}

pub struct AddTool;

#[async_trait]
impl ToolHandler for AddTool {
    async fn call(&self, args: &Map<String, Value>) -> Result<CallToolResult, McpError> {
        let a = number_arg(args, "a")?;
        let b = number_arg(args, "b")?;
        let sum = add_numbers(a, b);

        Ok(text_result(format!(
            "The sum of {} and {} is {sum}",
            format_number(a),
            format_number(b)
        )))
    }
}

pub struct GetTimeTool;

#[async_trait]
impl ToolHandler for GetTimeTool {
    async fn call(&self, _args: &Map<String, Value>) -> Result<CallToolResult, McpError> {
        Ok(text_result(
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        ))
    }
}
