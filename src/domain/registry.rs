//! Capability catalog: tools, resources and prompts exposed to clients
//!
//! The registry is built once at start-up and shared read-only afterwards.
//! Tool execution goes through [`ToolHandler`] implementations registered next
//! to their descriptors.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use rust_mcp_sdk::schema::{CallToolResult, Prompt, Resource, Tool};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    domain::{prompts, resources, schema::Schema, tools},
    errors::McpError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    Tools,
    Resources,
    Prompts,
}

impl CapabilityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tools => "tools",
            Self::Resources => "resources",
            Self::Prompts => "prompts",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: &Map<String, Value>) -> Result<CallToolResult, McpError>;
}

#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Schema,
}

impl ToolDescriptor {
    pub fn to_tool(&self) -> Tool {
        Tool {
            annotations: None,
            description: Some(self.description.to_string()),
            execution: None,
            icons: vec![],
            input_schema: self.input_schema.to_input_schema(),
            meta: None,
            name: self.name.to_string(),
            output_schema: None,
            title: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
    pub initial_text: String,
}

impl ResourceDescriptor {
    pub fn to_resource(&self) -> Resource {
        Resource {
            annotations: None,
            description: Some(self.description.to_string()),
            icons: vec![],
            meta: None,
            mime_type: Some(self.mime_type.to_string()),
            name: self.name.to_string(),
            size: None,
            title: None,
            uri: self.uri.to_string(),
        }
    }
}

pub type PromptRenderer = fn(&Map<String, Value>) -> Result<String, McpError>;

#[derive(Clone)]
pub struct PromptDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: Schema,
    pub render: PromptRenderer,
}

impl PromptDescriptor {
    pub fn to_prompt(&self) -> Prompt {
        Prompt {
            arguments: self.arguments.to_prompt_arguments(),
            description: Some(self.description.to_string()),
            icons: vec![],
            meta: None,
            name: self.name.to_string(),
            title: None,
        }
    }
}

impl fmt::Debug for PromptDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptDescriptor")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

/// Borrowed view of a single catalog entry returned by [`CapabilityRegistry::find`].
#[derive(Debug, Clone, Copy)]
pub enum Descriptor<'a> {
    Tool(&'a ToolDescriptor),
    Resource(&'a ResourceDescriptor),
    Prompt(&'a PromptDescriptor),
}

impl<'a> Descriptor<'a> {
    pub fn as_tool(self) -> Option<&'a ToolDescriptor> {
        match self {
            Self::Tool(tool) => Some(tool),
            _ => None,
        }
    }

    pub fn as_resource(self) -> Option<&'a ResourceDescriptor> {
        match self {
            Self::Resource(resource) => Some(resource),
            _ => None,
        }
    }

    pub fn as_prompt(self) -> Option<&'a PromptDescriptor> {
        match self {
            Self::Prompt(prompt) => Some(prompt),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate {kind} name: {name}")]
    Duplicate {
        kind: CapabilityKind,
        name: String,
    },
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: Arc<dyn ToolHandler>,
}

#[derive(Default)]
pub struct CapabilityRegistry {
    tools: Vec<RegisteredTool>,
    resources: Vec<ResourceDescriptor>,
    prompts: Vec<PromptDescriptor>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in catalog: echo/add/get_time, the scratch, context and config
    /// resources, and the three text prompts.
    pub fn with_defaults() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for (descriptor, handler) in tools::default_tools() {
            registry.register_tool(descriptor, handler)?;
        }
        for descriptor in resources::default_resources() {
            registry.register_resource(descriptor)?;
        }
        for descriptor in prompts::default_prompts() {
            registry.register_prompt(descriptor)?;
        }
        Ok(registry)
    }

    pub fn register_tool(
        &mut self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), RegistryError> {
        if self.find_tool(descriptor.name).is_some() {
            return Err(duplicate(CapabilityKind::Tools, descriptor.name));
        }
        self.tools.push(RegisteredTool {
            descriptor,
            handler,
        });
        Ok(())
    }

    pub fn register_resource(&mut self, descriptor: ResourceDescriptor) -> Result<(), RegistryError> {
        if self.find_resource(descriptor.uri).is_some() {
            return Err(duplicate(CapabilityKind::Resources, descriptor.uri));
        }
        self.resources.push(descriptor);
        Ok(())
    }

    pub fn register_prompt(&mut self, descriptor: PromptDescriptor) -> Result<(), RegistryError> {
        if self.find_prompt(descriptor.name).is_some() {
            return Err(duplicate(CapabilityKind::Prompts, descriptor.name));
        }
        self.prompts.push(descriptor);
        Ok(())
    }

    pub fn resources(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    /// Descriptors of one kind, in registration order.
    pub fn list(&self, kind: CapabilityKind) -> Vec<Descriptor<'_>> {
        match kind {
            CapabilityKind::Tools => self
                .tools
                .iter()
                .map(|tool| Descriptor::Tool(&tool.descriptor))
                .collect(),
            CapabilityKind::Resources => self.resources.iter().map(Descriptor::Resource).collect(),
            CapabilityKind::Prompts => self.prompts.iter().map(Descriptor::Prompt).collect(),
        }
    }

    /// Resources are looked up by URI, tools and prompts by name.
    pub fn find(&self, kind: CapabilityKind, name: &str) -> Option<Descriptor<'_>> {
        match kind {
            CapabilityKind::Tools => self.find_tool(name).map(Descriptor::Tool),
            CapabilityKind::Resources => self.find_resource(name).map(Descriptor::Resource),
            CapabilityKind::Prompts => self.find_prompt(name).map(Descriptor::Prompt),
        }
    }

    fn find_tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools
            .iter()
            .find(|tool| tool.descriptor.name == name)
            .map(|tool| &tool.descriptor)
    }

    fn find_resource(&self, uri: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|resource| resource.uri == uri)
    }

    fn find_prompt(&self, name: &str) -> Option<&PromptDescriptor> {
        self.prompts.iter().find(|prompt| prompt.name == name)
    }

    pub async fn invoke(
        &self,
        tool_name: &str,
        args: &Map<String, Value>,
    ) -> Result<CallToolResult, McpError> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.descriptor.name == tool_name)
            .ok_or_else(|| McpError::ToolNotFound(tool_name.to_string()))?;

        tool.handler.call(args).await
    }
}

fn duplicate(kind: CapabilityKind, name: &str) -> RegistryError {
    RegistryError::Duplicate {
        kind,
        name: name.to_string(),
    }
}
