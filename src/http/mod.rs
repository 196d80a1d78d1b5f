//! HTTP transport for the Model Context Protocol
//!
//! Provides the event-stream endpoint, the session-scoped message endpoint and
//! the health and discovery endpoints.

pub mod handlers;
