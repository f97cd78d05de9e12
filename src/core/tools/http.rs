use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::base::{ToolError, ToolProvider, ToolResult};
use crate::core::llm::ToolDefinition;

/// Declarative description of an HTTP lookup tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpToolConfig {
    pub name: String,
    pub description: String,
    pub url: String,
    /// JSON schema of the arguments; defaults to an empty object schema
    #[serde(default = "default_parameters")]
    pub parameters: Value,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_parameters() -> Value {
    json!({ "type": "object", "properties": {}, "additionalProperties": false })
}

fn default_timeout_seconds() -> u64 {
    5
}

/// Tool backed by an HTTP GET; arguments become query parameters
pub struct HttpLookupTool {
    definition: ToolDefinition,
    url: String,
    client: reqwest::Client,
}

impl HttpLookupTool {
    pub fn new(config: HttpToolConfig) -> ToolResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ToolError::NetworkError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            definition: ToolDefinition {
                name: config.name,
                description: config.description,
                parameters: config.parameters,
            },
            url: config.url,
            client,
        })
    }

    fn query_pairs(arguments: &Value) -> ToolResult<Vec<(String, String)>> {
        let object = match arguments {
            Value::Null => return Ok(Vec::new()),
            Value::Object(object) => object,
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "expected an object, got {other}"
                )));
            }
        };
        Ok(object
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect())
    }
}

#[async_trait]
impl ToolProvider for HttpLookupTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn invoke(&self, arguments: &Value) -> ToolResult<Value> {
        let query = Self::query_pairs(arguments)?;
        debug!(tool = %self.definition.name, "Invoking lookup with {:?}", query);

        let response = self
            .client
            .get(&self.url)
            .query(&query)
            .send()
            .await
            .map_err(|e| ToolError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(tool = %self.definition.name, "Lookup returned {}", status);
            return Err(ToolError::LookupFailed(format!("HTTP {status}")));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ToolError::LookupFailed(format!("Invalid JSON body: {e}")))
    }
}
