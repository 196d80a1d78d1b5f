//! Capability catalog and argument validation
//!
//! Provides the tools, resources and prompts exposed over the MCP protocol,
//! the registry that holds them and the schema validator guarding tool calls.

pub mod prompts;
pub mod registry;
pub mod resources;
pub mod schema;
pub mod tools;
pub mod utils;
