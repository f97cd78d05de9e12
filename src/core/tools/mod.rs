mod base;
pub mod http;

pub use base::{ToolError, ToolProvider, ToolRegistry, ToolResult};
pub use http::{HttpLookupTool, HttpToolConfig};

use std::sync::Arc;

/// Build a registry from declarative tool configs
pub fn build_registry(configs: &[HttpToolConfig]) -> ToolResult<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for config in configs {
        registry.register(Arc::new(HttpLookupTool::new(config.clone())?));
    }
    Ok(registry)
}
