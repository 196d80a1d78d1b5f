//! Prompt templates exposed via Model Context Protocol

use rust_mcp_sdk::schema::{ContentBlock, GetPromptResult, PromptMessage, Role, TextContent};
use serde_json::{Map, Value};

use crate::domain::{
    registry::PromptDescriptor,
    schema::{validate_required, ParamSpec, ParamType, Schema},
    utils::value_as_text,
};
use crate::errors::McpError;

pub const SUMMARY_LENGTHS: [&str; 3] = ["short", "medium", "long"];
pub const DEFAULT_IDEA_COUNT: u64 = 5;

pub fn default_prompts() -> Vec<PromptDescriptor> {
    vec![
        PromptDescriptor {
            name: "summarize",
            description: "Summarize the given content",
            arguments: Schema::new(vec![
                ParamSpec::required("content", ParamType::String, "The content to summarize"),
                ParamSpec::optional(
                    "length",
                    ParamType::String,
                    "How brief the summary should be (short, medium, long)",
                ),
            ]),
            render: render_summarize,
        },
        PromptDescriptor {
            name: "analyze_sentiment",
            description: "Analyze the sentiment of the provided text",
            arguments: Schema::new(vec![ParamSpec::required(
                "text",
                ParamType::String,
                "The text to analyze",
            )]),
            render: render_analyze_sentiment,
        },
        PromptDescriptor {
            name: "generate_ideas",
            description: "Generate creative ideas for a given topic",
            arguments: Schema::new(vec![
                ParamSpec::required(
                    "topic",
                    ParamType::String,
                    "The topic to generate ideas for",
                ),
                ParamSpec::optional("count", ParamType::Number, "Number of ideas to generate"),
            ]),
            render: render_generate_ideas,
        },
    ]
}

/// Checks required arguments, renders the template and wraps it as a single
/// user message.
pub fn get_prompt(
    prompt: &PromptDescriptor,
    args: &Map<String, Value>,
) -> Result<GetPromptResult, McpError> {
    validate_required(&prompt.arguments, args)?;
    let text = (prompt.render)(args)?;

    Ok(GetPromptResult {
        description: Some(prompt.description.to_string()),
        messages: vec![PromptMessage {
            content: ContentBlock::from(TextContent::new(text, None, None)),
            role: Role::User,
        }],
        meta: None,
    })
}

fn text_arg(args: &Map<String, Value>, name: &str) -> Option<String> {
    args.get(name)
        .filter(|value| !value.is_null())
        .map(value_as_text)
}

fn render_summarize(args: &Map<String, Value>) -> Result<String, McpError> {
    let content = text_arg(args, "content").unwrap_or_default();
    let format_clause = match text_arg(args, "length") {
        Some(length) if SUMMARY_LENGTHS.contains(&length.as_str()) => {
            format!(" in a {length} format")
        }
        Some(length) => {
            return Err(McpError::invalid_params(format!(
                "length must be one of: short, medium, long (got '{length}')"
            )))
        }
        None => String::new(),
    };

    Ok(format!(
        "Please summarize the following content{format_clause}:\n\n{content}"
    ))
}

fn render_analyze_sentiment(args: &Map<String, Value>) -> Result<String, McpError> {
    let text = text_arg(args, "text").unwrap_or_default();
    Ok(format!(
        "Please analyze the sentiment of the following text and provide a detailed analysis:\n\n{text}"
    ))
}

fn render_generate_ideas(args: &Map<String, Value>) -> Result<String, McpError> {
    let topic = text_arg(args, "topic").unwrap_or_default();
    let count = match args.get("count").filter(|value| !value.is_null()) {
        None => DEFAULT_IDEA_COUNT,
        Some(value) => parse_count(value).ok_or_else(|| {
            McpError::invalid_params("count must be a positive integer")
        })?,
    };

    Ok(format!(
        "Generate {count} creative ideas for the following topic: {topic}"
    ))
}

// Prompt arguments usually arrive as strings, so "3" and 3 are both accepted.
fn parse_count(value: &Value) -> Option<u64> {
    let count = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }?;

    (count > 0).then_some(count)
}
