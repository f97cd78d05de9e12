use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A single recognition update from an STT provider.
///
/// Interim events carry `is_final == false` and may be revised by later
/// events. Speaker attribution is per word, in the order the words were
/// recognised; providers without diarization leave `speakers` empty.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEvent {
    /// The recognised text
    pub text: String,
    /// Whether the provider will no longer revise this text
    pub is_final: bool,
    /// Whether the provider detected the end of the speaker's turn
    pub is_speech_final: bool,
    /// Confidence score of the transcription (0.0 to 1.0)
    pub confidence: f32,
    /// Speaker tag of every recognised word
    pub speakers: Vec<u32>,
    /// The provider saw a gap in speech after the last word; carries no text
    pub utterance_end: bool,
    /// Milliseconds since the Unix epoch when the event was received
    pub timestamp_ms: u64,
}

impl TranscriptEvent {
    pub fn new(text: impl Into<String>, is_final: bool, is_speech_final: bool, confidence: f32) -> Self {
        Self {
            text: text.into(),
            is_final,
            is_speech_final,
            confidence: confidence.clamp(0.0, 1.0),
            speakers: Vec::new(),
            utterance_end: false,
            timestamp_ms: now_ms(),
        }
    }

    /// Notification that the caller stopped talking without a turn-ending final
    pub fn utterance_end() -> Self {
        Self {
            utterance_end: true,
            ..Self::new(String::new(), false, false, 0.0)
        }
    }

    pub fn with_speakers(mut self, speakers: Vec<u32>) -> Self {
        self.speakers = speakers;
        self
    }

    /// The speaker tag attributed to most words, if any were tagged.
    ///
    /// Ties resolve to the tag that appeared first.
    pub fn primary_speaker(&self) -> Option<u32> {
        let mut counts: HashMap<u32, usize> = HashMap::new();
        for tag in &self.speakers {
            *counts.entry(*tag).or_default() += 1;
        }
        let best = counts.values().copied().max()?;
        self.speakers
            .iter()
            .copied()
            .find(|tag| counts.get(tag) == Some(&best))
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Configuration for STT providers
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct STTConfig {
    pub provider: String,
    /// API key for the STT provider
    pub api_key: String,
    /// Language code for transcription (e.g., "en-US", "es-ES")
    pub language: String,
    /// Sample rate of the audio in Hz
    pub sample_rate: u32,
    /// Number of audio channels (1 for mono, 2 for stereo)
    pub channels: u16,
    /// Enable punctuation in results
    pub punctuation: bool,
    /// Encoding of the inbound audio
    pub encoding: String,
    /// Model to use for transcription
    pub model: String,
    /// Tag every word with a speaker
    pub diarize: bool,
    /// Silence in milliseconds before the provider ends a turn
    pub endpointing_ms: Option<u32>,
    /// Gap in milliseconds after the last word before an utterance-end notice
    #[serde(default)]
    pub utterance_end_ms: Option<u32>,
    /// Override for the provider endpoint
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for STTConfig {
    fn default() -> Self {
        Self {
            provider: "deepgram".to_string(),
            api_key: String::new(),
            language: "en-US".to_string(),
            sample_rate: 8000,
            channels: 1,
            punctuation: true,
            encoding: "mulaw".to_string(),
            model: "nova-2-phonecall".to_string(),
            diarize: true,
            endpointing_ms: Some(300),
            utterance_end_ms: Some(1000),
            base_url: None,
        }
    }
}

/// Error types for STT operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum STTError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Type alias for STT result callback
pub type STTResultCallback =
    Arc<dyn Fn(TranscriptEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Type alias for STT error callback
pub type STTErrorCallback =
    Arc<dyn Fn(STTError) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Base trait for Speech-to-Text providers
#[async_trait::async_trait]
pub trait BaseSTT: Send + Sync {
    /// Create a new instance of the STT provider with the given configuration
    fn new(config: STTConfig) -> Result<Self, STTError>
    where
        Self: Sized;

    /// Connect to the STT provider
    async fn connect(&mut self) -> Result<(), STTError>;

    /// Disconnect from the STT provider
    async fn disconnect(&mut self) -> Result<(), STTError>;

    /// Check if the connection is ready to be used
    fn is_ready(&self) -> bool;

    /// Send encoded audio to the STT provider for transcription
    async fn send_audio(&mut self, audio_data: Vec<u8>) -> Result<(), STTError>;

    /// Register a callback that receives every transcript event
    ///
    /// Must be called before `connect`.
    async fn on_result(&mut self, callback: STTResultCallback) -> Result<(), STTError>;

    /// Register a callback for errors that occur after the connection is established
    async fn on_error(&mut self, callback: STTErrorCallback) -> Result<(), STTError>;

    /// Get the current configuration
    fn get_config(&self) -> Option<&STTConfig>;

    /// Get provider-specific information
    fn get_provider_info(&self) -> &'static str;
}

/// Connection state for STT providers
#[derive(Debug, Clone, PartialEq)]
pub enum STTConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}
