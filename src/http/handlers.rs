//! Axum HTTP handlers for the web server
//!
//! `GET /sse` opens an event stream and announces its session id; requests are
//! then posted to `POST /message?sessionId=...` and answered in the response
//! body.

use std::convert::Infallible;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::StreamExt;

use crate::mcp::rpc::{json_rpc_error, INVALID_REQUEST, PARSE_ERROR};
use crate::{errors::AppError, AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub connections: usize,
}

#[derive(Debug, Serialize)]
pub struct EndpointListing {
    pub health: &'static str,
    pub sse: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: String,
    pub version: String,
    pub endpoints: EndpointListing,
    pub documentation: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        connections: state.sessions.count(),
    })
}

pub async fn discovery(State(state): State<AppState>) -> Json<DiscoveryResponse> {
    let identity = state.dispatcher.identity();
    Json(DiscoveryResponse {
        name: identity.name.clone(),
        version: identity.version.clone(),
        endpoints: EndpointListing {
            health: "GET /health",
            sse: "GET /sse",
            message: "POST /message",
        },
        documentation: "https://modelcontextprotocol.io",
    })
}

pub async fn sse_endpoint(State(state): State<AppState>) -> Result<Response, AppError> {
    let stream = state
        .gateway
        .open_stream()
        .map_err(|err| AppError::internal(format!("failed to open event stream: {err}")))?;

    let events = stream.map(|event| Ok::<Event, Infallible>(Event::from(event)));
    Ok((
        [("x-accel-buffering", "no")],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response())
}

pub async fn message_endpoint(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Result<Response, AppError> {
    let session_id = query
        .session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("missing_session_id", "Missing sessionId"))?;

    if !state.sessions.contains(&session_id) {
        return Err(AppError::not_found("session_not_found", "Session not found"));
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            return Ok((
                StatusCode::OK,
                Json(json_rpc_error(None, PARSE_ERROR, "Parse error")),
            )
                .into_response())
        }
    };

    if let Some(batch) = payload.as_array() {
        if batch.is_empty() {
            return Ok((
                StatusCode::OK,
                Json(json_rpc_error(None, INVALID_REQUEST, "Invalid Request")),
            )
                .into_response());
        }

        let mut responses = Vec::new();
        for item in batch {
            if let Some(response) = state
                .dispatcher
                .handle_json_rpc_value(&session_id, item.clone())
                .await
            {
                responses.push(response);
            }
        }

        if responses.is_empty() {
            return Ok(StatusCode::NO_CONTENT.into_response());
        }

        return Ok((StatusCode::OK, Json(Value::Array(responses))).into_response());
    }

    Ok(
        match state
            .dispatcher
            .handle_json_rpc_value(&session_id, payload)
            .await
        {
            Some(response) => (StatusCode::OK, Json(response)).into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        },
    )
}
