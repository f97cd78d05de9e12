use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::llm::{ToolDefinition, ToolInvocation};

/// Error types for tool invocations
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Lookup failed: {0}")]
    LookupFailed(String),
    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Result type for tool invocations
pub type ToolResult<T> = Result<T, ToolError>;

/// An external lookup the model can call
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Name, description and argument schema offered to the model
    fn definition(&self) -> &ToolDefinition;

    /// Run the lookup; no retries are attempted
    async fn invoke(&self, arguments: &Value) -> ToolResult<Value>;
}

/// Tools available to a call, keyed by name
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolProvider>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn ToolProvider>) {
        let name = tool.definition().name.clone();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Definitions in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition().clone())
            .collect()
    }

    pub async fn invoke(&self, invocation: &ToolInvocation) -> ToolResult<Value> {
        let tool = self
            .tools
            .get(&invocation.name)
            .ok_or_else(|| ToolError::UnknownTool(invocation.name.clone()))?;
        tool.invoke(&invocation.arguments).await
    }
}
