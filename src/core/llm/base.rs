use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Chat participant role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of the conversation transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A tool the model may ask to invoke
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
}

/// A fully assembled tool-call request from the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Provider-independent streaming event
#[derive(Debug, Clone, PartialEq)]
pub enum LLMEvent {
    /// A fragment of assistant text
    Content(String),
    /// The model asked for a tool; arguments are complete
    ToolCall(ToolInvocation),
    /// The model finished this turn
    Done,
}

/// LLM-specific error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum LLMError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Reply deadline exceeded")]
    DeadlineExceeded,
}

/// Result type for LLM operations
pub type LLMResult<T> = Result<T, LLMError>;

/// Receiving half of a model stream. Dropping it stops the producer.
pub type LLMStream = mpsc::Receiver<LLMResult<LLMEvent>>;

/// Configuration for LLM providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    pub provider: String,
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Connect-and-first-byte timeout in seconds
    pub request_timeout: Option<u64>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: String::new(),
            model: "gpt-4o".to_string(),
            base_url: None,
            temperature: None,
            max_tokens: None,
            request_timeout: Some(15),
        }
    }
}

/// Base trait for streaming chat models
#[async_trait]
pub trait BaseLLM: Send + Sync {
    /// Start a streamed completion over `messages`.
    ///
    /// An empty `tools` slice means the model is not offered any tools.
    /// The returned stream ends with `LLMEvent::Done` or an error.
    async fn stream_chat(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> LLMResult<LLMStream>;

    /// Get provider-specific information
    fn get_provider_info(&self) -> &'static str;
}

/// Shared LLM provider handle
pub type BoxedLLM = Arc<dyn BaseLLM>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_serialize_lowercase() {
        let message = ChatMessage::assistant("hello");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn test_message_constructors() {
        assert_eq!(ChatMessage::system("s").role, Role::System);
        assert_eq!(ChatMessage::user("u").role, Role::User);
        assert_eq!(ChatMessage::assistant("a").role, Role::Assistant);
    }
}
