//! Model Context Protocol (MCP) request handling
//!
//! Provides JSON-RPC envelope parsing and framing, and the dispatcher that
//! routes each request to the capability catalog.

pub mod rpc;
pub mod server;
