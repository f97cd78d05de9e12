//! Error types for call session operations

use crate::core::{llm::LLMError, stt::STTError, tools::ToolError, tts::TTSError};

/// Failure to deliver audio or control messages to the caller
#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    #[error("Outbound stream closed")]
    Closed,
    #[error("Failed to encode outbound message: {0}")]
    Encoding(String),
}

/// Error types for call session operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallSessionError {
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
    #[error("TTS error: {0}")]
    TTS(#[from] TTSError),
    #[error("STT error: {0}")]
    STT(#[from] STTError),
    #[error("LLM error: {0}")]
    LLM(#[from] LLMError),
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),
    #[error("Session closed")]
    Closed,
}

/// Result type for call session operations
pub type CallSessionResult<T> = Result<T, CallSessionError>;
