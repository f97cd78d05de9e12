//! # TTS Base Trait
//!
//! Unified interface for Text-to-Speech providers. A provider turns one
//! piece of text into one complete audio buffer; ordering and playback are
//! handled by the call session, so providers hold no per-call state and can
//! serve many syntheses concurrently.
//!
//! ```rust,ignore
//! use voxbridge::core::tts::{create_tts_provider, TTSConfig};
//!
//! let tts = create_tts_provider("deepgram", TTSConfig {
//!     api_key: "key".to_string(),
//!     ..Default::default()
//! })?;
//! let audio = tts.synthesize("Hi, how can I help you?").await?;
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Audio data structure for TTS output
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    /// Encoded audio bytes, passed through to the sink untouched
    pub data: Bytes,
    /// Sample rate of the audio
    pub sample_rate: u32,
    /// Audio encoding (e.g., "mulaw", "linear16")
    pub format: String,
    /// Duration of the audio in milliseconds, when known
    pub duration_ms: Option<u32>,
}

impl AudioData {
    /// Wrap 8 kHz mu-law audio, the native telephony encoding.
    ///
    /// Mu-law carries one byte per sample, so the duration follows
    /// directly from the payload length.
    pub fn mulaw(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let duration_ms = (data.len() as u64 * 1000 / 8000) as u32;
        Self {
            data,
            sample_rate: 8000,
            format: "mulaw".to_string(),
            duration_ms: Some(duration_ms),
        }
    }
}

/// TTS-specific error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum TTSError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Audio generation failed: {0}")]
    AudioGenerationFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),
}

/// Result type for TTS operations
pub type TTSResult<T> = Result<T, TTSError>;

/// Pronunciation replacement configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Pronunciation {
    /// Word to replace
    pub word: String,
    /// Pronunciation to use instead
    pub pronunciation: String,
}

/// Configuration for TTS providers
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct TTSConfig {
    pub provider: String,
    /// API key for the TTS provider
    pub api_key: String,
    /// Voice model to use for synthesis
    pub voice_id: Option<String>,
    /// Audio encoding requested from the provider
    pub audio_format: Option<String>,
    /// Sample rate requested from the provider
    pub sample_rate: Option<u32>,
    /// Request timeout in seconds
    pub request_timeout: Option<u64>,
    /// Pronunciation replacements to apply before TTS
    #[serde(default)]
    pub pronunciations: Vec<Pronunciation>,
    /// Override for the provider endpoint
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for TTSConfig {
    fn default() -> Self {
        Self {
            provider: "deepgram".to_string(),
            api_key: String::new(),
            voice_id: Some("aura-asteria-en".to_string()),
            audio_format: Some("mulaw".to_string()),
            sample_rate: Some(8000),
            request_timeout: Some(10),
            pronunciations: Vec::new(),
            base_url: None,
        }
    }
}

/// Base trait for Text-to-Speech providers
#[async_trait]
pub trait BaseTTS: Send + Sync {
    /// Create a new instance of the TTS provider
    fn new(config: TTSConfig) -> TTSResult<Self>
    where
        Self: Sized;

    /// Synthesize `text` into a single audio buffer
    async fn synthesize(&self, text: &str) -> TTSResult<AudioData>;

    /// Get the current configuration
    fn get_config(&self) -> &TTSConfig;

    /// Get provider-specific information
    fn get_provider_info(&self) -> &'static str;
}

/// Shared TTS provider handle
pub type BoxedTTS = Arc<dyn BaseTTS>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mulaw_duration_from_length() {
        let audio = AudioData::mulaw(vec![0u8; 8000]);
        assert_eq!(audio.duration_ms, Some(1000));
        assert_eq!(audio.sample_rate, 8000);
        assert_eq!(audio.format, "mulaw");

        let audio = AudioData::mulaw(vec![0u8; 160]);
        assert_eq!(audio.duration_ms, Some(20));
    }

    #[test]
    fn test_default_config_targets_telephony_audio() {
        let config = TTSConfig::default();
        assert_eq!(config.audio_format.as_deref(), Some("mulaw"));
        assert_eq!(config.sample_rate, Some(8000));
    }
}
