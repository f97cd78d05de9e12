//! Media stream error types

use thiserror::Error;

use crate::core::call_session::CallSessionError;
use crate::core::stt::STTError;

/// Media stream handler error types
#[derive(Debug, Error)]
pub enum MediaStreamError {
    /// Frame could not be parsed
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    /// Media payload was not valid base64
    #[error("Invalid media payload: {0}")]
    InvalidPayload(String),

    /// A second `start` arrived on the same socket
    #[error("Stream already started")]
    AlreadyStarted,

    /// Frame requires a started stream
    #[error("Stream not started")]
    NotStarted,

    #[error("STT error: {0}")]
    STT(#[from] STTError),

    #[error("Call session error: {0}")]
    Session(#[from] CallSessionError),
}

/// Result type for media stream operations
pub type MediaStreamResult<T> = Result<T, MediaStreamError>;
