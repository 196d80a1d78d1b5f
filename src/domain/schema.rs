//! Declared parameter schemas and the fail-fast argument validator
//!
//! Schemas only describe flat argument maps with primitive field types, which is
//! all the tool and prompt catalog needs.

use std::{collections::HashMap, fmt};

use rust_mcp_sdk::schema::{PromptArgument, ToolInputSchema};
use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Object,
    Boolean,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Object => "object",
            Self::Boolean => "boolean",
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Object => value.is_object(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub param_type: ParamType,
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: &'static str, param_type: ParamType, description: &'static str) -> Self {
        Self {
            name,
            description,
            param_type,
            required: true,
        }
    }

    pub fn optional(name: &'static str, param_type: ParamType, description: &'static str) -> Self {
        Self {
            name,
            description,
            param_type,
            required: false,
        }
    }
}

/// Ordered field declarations. Declaration order drives validation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    params: Vec<ParamSpec>,
}

impl Schema {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|param| param.name == name)
    }

    /// Object schema advertised in `tools/list`.
    pub fn to_input_schema(&self) -> ToolInputSchema {
        let properties: HashMap<String, Map<String, Value>> = self
            .params
            .iter()
            .map(|param| {
                let mut property = Map::new();
                property.insert("type".to_string(), json!(param.param_type.as_str()));
                property.insert("description".to_string(), json!(param.description));
                (param.name.to_string(), property)
            })
            .collect();
        let required = self
            .params
            .iter()
            .filter(|param| param.required)
            .map(|param| param.name.to_string())
            .collect();

        ToolInputSchema::new(required, Some(properties), None)
    }

    /// Argument list advertised in `prompts/list`.
    pub fn to_prompt_arguments(&self) -> Vec<PromptArgument> {
        self.params
            .iter()
            .map(|param| PromptArgument {
                description: Some(param.description.to_string()),
                name: param.name.to_string(),
                required: Some(param.required),
                title: None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required argument '{0}'")]
    MissingArgument(String),
    #[error("unknown argument '{0}'")]
    UnknownArgument(String),
    #[error("argument '{field}' must be a {expected}")]
    TypeMismatch { field: String, expected: ParamType },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingArgument(_) => "missing_argument",
            Self::UnknownArgument(_) => "unknown_argument",
            Self::TypeMismatch { .. } => "type_mismatch",
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::MissingArgument(field) | Self::UnknownArgument(field) => field,
            Self::TypeMismatch { field, .. } => field,
        }
    }

    pub fn details(&self) -> Value {
        match self {
            Self::TypeMismatch { field, expected } => json!({
                "field": field,
                "expected": expected.as_str(),
            }),
            _ => json!({ "field": self.field() }),
        }
    }
}

/// Checks that every required field is present, in declaration order.
pub fn validate_required(schema: &Schema, args: &Map<String, Value>) -> Result<(), ValidationError> {
    match schema
        .params
        .iter()
        .find(|param| param.required && !args.contains_key(param.name))
    {
        Some(missing) => Err(ValidationError::MissingArgument(missing.name.to_string())),
        None => Ok(()),
    }
}

/// Full check: required fields first, then declared field types, then
/// undeclared keys. Stops at the first failure.
pub fn validate(schema: &Schema, args: &Map<String, Value>) -> Result<(), ValidationError> {
    validate_required(schema, args)?;

    for param in &schema.params {
        if let Some(value) = args.get(param.name) {
            if !param.param_type.matches(value) {
                return Err(ValidationError::TypeMismatch {
                    field: param.name.to_string(),
                    expected: param.param_type,
                });
            }
        }
    }

    if let Some(unknown) = args.keys().find(|key| schema.get(key).is_none()) {
        return Err(ValidationError::UnknownArgument(unknown.clone()));
    }

    Ok(())
}
