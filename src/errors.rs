use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::schema::ValidationError;

/// Errors raised by the HTTP surface before a request reaches the dispatcher.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest {
        code: &'static str,
        message: &'static str,
    },
    #[error("not found: {message}")]
    NotFound {
        code: &'static str,
        message: &'static str,
    },
    #[error("internal error")]
    Internal { code: &'static str, message: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: &'static str) -> Self {
        Self::BadRequest { code, message }
    }

    pub fn not_found(code: &'static str, message: &'static str) -> Self {
        Self::NotFound { code, message }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: "internal_error",
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, code, message.to_string())
            }
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, code, message.to_string()),
            Self::Internal { code, message } => {
                tracing::error!(error = %message, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code,
                    "internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                message,
                details: json!({}),
            }),
        )
            .into_response()
    }
}

/// Protocol-level failures. Every variant is turned into a JSON-RPC error
/// payload by [`crate::mcp::rpc::mcp_error_to_json_rpc`].
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Invalid params: {0}")]
    Validation(#[from] ValidationError),
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
    #[error("Prompt not found: {0}")]
    PromptNotFound(String),
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
    #[error("Resource is read-only: {0}")]
    ResourceWriteForbidden(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl McpError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// JSON-RPC error code.
    pub fn code(&self) -> i32 {
        match self {
            Self::MethodNotFound(_) => -32601,
            Self::Internal(_) => -32603,
            Self::InvalidParams(_)
            | Self::Validation(_)
            | Self::ToolNotFound(_)
            | Self::PromptNotFound(_)
            | Self::ResourceNotFound(_)
            | Self::ResourceWriteForbidden(_) => -32602,
        }
    }

    /// Stable machine-readable code carried in the error `data` object.
    pub fn data_code(&self) -> &'static str {
        match self {
            Self::MethodNotFound(_) => "method_not_found",
            Self::InvalidParams(_) => "invalid_params",
            Self::Validation(err) => err.code(),
            Self::ToolNotFound(_) => "tool_not_found",
            Self::PromptNotFound(_) => "prompt_not_found",
            Self::ResourceNotFound(_) => "resource_not_found",
            Self::ResourceWriteForbidden(_) => "resource_write_forbidden",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn details(&self) -> Value {
        match self {
            Self::MethodNotFound(method) => json!({ "method": method }),
            Self::Validation(err) => err.details(),
            Self::ToolNotFound(name) | Self::PromptNotFound(name) => json!({ "name": name }),
            Self::ResourceNotFound(uri) | Self::ResourceWriteForbidden(uri) => {
                json!({ "uri": uri })
            }
            Self::InvalidParams(_) | Self::Internal(_) => json!({}),
        }
    }
}
