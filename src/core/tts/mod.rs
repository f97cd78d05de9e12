mod base;
pub mod cache;
pub mod deepgram;
pub mod pronunciation;

pub use base::{AudioData, BaseTTS, BoxedTTS, Pronunciation, TTSConfig, TTSError, TTSResult};
pub use cache::SynthesisCache;
pub use deepgram::{DEEPGRAM_TTS_URL, DeepgramTTS};
pub use pronunciation::PronunciationReplacer;

/// Factory function to create a TTS provider.
///
/// # Supported Providers
///
/// - `"deepgram"` - Deepgram REST speak API
pub fn create_tts_provider(provider_type: &str, config: TTSConfig) -> TTSResult<BoxedTTS> {
    match provider_type.to_lowercase().as_str() {
        "deepgram" => Ok(std::sync::Arc::new(DeepgramTTS::new(config)?)),
        _ => Err(TTSError::InvalidConfiguration(format!(
            "Unsupported TTS provider: {provider_type}. Supported providers: deepgram"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tts_provider_rejects_unknown() {
        let result = create_tts_provider("polly", TTSConfig::default());
        assert!(matches!(result, Err(TTSError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_create_tts_provider_deepgram() {
        let config = TTSConfig {
            api_key: "key".to_string(),
            ..Default::default()
        };
        let tts = create_tts_provider("Deepgram", config).unwrap();
        assert_eq!(tts.get_provider_info(), "Deepgram TTS REST v1");
    }
}
