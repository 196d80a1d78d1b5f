//! Readable and writable resources exposed via Model Context Protocol
//!
//! Content lives in a [`ResourceStore`] keyed by URI. Entries under the
//! `file://` scheme are read-only.

use std::collections::HashMap;

use rust_mcp_sdk::schema::{ReadResourceContent, ReadResourceResult, TextResourceContents};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{domain::registry::ResourceDescriptor, errors::McpError};

pub const SCRATCH_RESOURCE_URI: &str = "memory://scratch";
pub const CONTEXT_RESOURCE_URI: &str = "memory://context";
pub const CONFIG_RESOURCE_URI: &str = "file://config";

const READ_ONLY_SCHEME: &str = "file://";

pub fn default_resources() -> Vec<ResourceDescriptor> {
    vec![
        ResourceDescriptor {
            uri: SCRATCH_RESOURCE_URI,
            name: "scratch-pad",
            description: "A temporary scratch pad for notes and ideas",
            mime_type: "text/plain",
            initial_text: String::new(),
        },
        ResourceDescriptor {
            uri: CONTEXT_RESOURCE_URI,
            name: "context-storage",
            description: "Stores conversation context and state",
            mime_type: "application/json",
            initial_text: "{}".to_string(),
        },
        ResourceDescriptor {
            uri: CONFIG_RESOURCE_URI,
            name: "configuration",
            description: "Server configuration and settings",
            mime_type: "application/json",
            initial_text: json!({ "version": "1.0.0", "debug": false }).to_string(),
        },
    ]
}

pub fn is_write_protected(uri: &str) -> bool {
    uri.starts_with(READ_ONLY_SCHEME)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceContent {
    pub uri: String,
    pub mime_type: String,
    pub text: String,
}

impl ResourceContent {
    pub fn into_read_result(self) -> ReadResourceResult {
        ReadResourceResult {
            contents: vec![ReadResourceContent::from(TextResourceContents {
                meta: None,
                mime_type: Some(self.mime_type),
                text: self.text,
                uri: self.uri,
            })],
            meta: None,
        }
    }
}

#[derive(Debug)]
struct StoredResource {
    mime_type: String,
    text: String,
}

/// Current text of every known resource. Writes take the lock exclusively so
/// concurrent writers to the same URI are applied one after another.
#[derive(Debug)]
pub struct ResourceStore {
    entries: RwLock<HashMap<String, StoredResource>>,
}

impl ResourceStore {
    pub fn from_descriptors<'a>(descriptors: impl IntoIterator<Item = &'a ResourceDescriptor>) -> Self {
        let entries = descriptors
            .into_iter()
            .map(|descriptor| {
                (
                    descriptor.uri.to_string(),
                    StoredResource {
                        mime_type: descriptor.mime_type.to_string(),
                        text: descriptor.initial_text.clone(),
                    },
                )
            })
            .collect();

        Self {
            entries: RwLock::new(entries),
        }
    }

    pub async fn read(&self, uri: &str) -> Result<ResourceContent, McpError> {
        let entries = self.entries.read().await;
        let entry = entries
            .get(uri)
            .ok_or_else(|| McpError::ResourceNotFound(uri.to_string()))?;

        Ok(ResourceContent {
            uri: uri.to_string(),
            mime_type: entry.mime_type.clone(),
            text: entry.text.clone(),
        })
    }

    pub async fn write(&self, uri: &str, text: String) -> Result<(), McpError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(uri)
            .ok_or_else(|| McpError::ResourceNotFound(uri.to_string()))?;

        if is_write_protected(uri) {
            return Err(McpError::ResourceWriteForbidden(uri.to_string()));
        }

        debug!(uri, bytes = text.len(), "resource content replaced");
        entry.text = text;
        Ok(())
    }
}
