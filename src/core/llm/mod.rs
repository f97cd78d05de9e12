mod base;
pub mod openai;

pub use base::{
    BaseLLM, BoxedLLM, ChatMessage, LLMConfig, LLMError, LLMEvent, LLMResult, LLMStream, Role,
    ToolDefinition, ToolInvocation,
};
pub use openai::{OPENAI_BASE_URL, OpenAILLM, SseDecoder};

/// Factory function to create an LLM provider.
///
/// # Supported Providers
///
/// - `"openai"` - any OpenAI-compatible chat completions endpoint
pub fn create_llm_provider(config: LLMConfig) -> LLMResult<BoxedLLM> {
    match config.provider.to_lowercase().as_str() {
        "openai" => Ok(std::sync::Arc::new(OpenAILLM::new(config)?)),
        other => Err(LLMError::InvalidConfiguration(format!(
            "Unsupported LLM provider: {other}. Supported providers: openai"
        ))),
    }
}
