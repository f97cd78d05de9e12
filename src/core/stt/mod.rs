mod base;
pub mod deepgram;

pub use base::{
    BaseSTT, STTConfig, STTConnectionState, STTError, STTErrorCallback, STTResultCallback,
    TranscriptEvent,
};
pub use deepgram::{DEEPGRAM_STT_URL, DeepgramSTT};

/// Supported STT providers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum STTProvider {
    /// Deepgram streaming WebSocket API
    Deepgram,
}

impl std::fmt::Display for STTProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            STTProvider::Deepgram => write!(f, "deepgram"),
        }
    }
}

impl std::str::FromStr for STTProvider {
    type Err = STTError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deepgram" => Ok(STTProvider::Deepgram),
            _ => Err(STTError::ConfigurationError(format!(
                "Unsupported STT provider: {s}. Supported providers: deepgram"
            ))),
        }
    }
}

/// Factory function to create STT providers by name
pub fn create_stt_provider(provider: &str, config: STTConfig) -> Result<Box<dyn BaseSTT>, STTError> {
    match provider.parse::<STTProvider>()? {
        STTProvider::Deepgram => Ok(Box::new(<DeepgramSTT as BaseSTT>::new(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing_is_case_insensitive() {
        assert_eq!("Deepgram".parse::<STTProvider>().unwrap(), STTProvider::Deepgram);
        assert!("whisper".parse::<STTProvider>().is_err());
    }

    #[test]
    fn test_create_stt_provider_rejects_unknown() {
        let result = create_stt_provider("nope", STTConfig::default());
        assert!(matches!(result, Err(STTError::ConfigurationError(_))));
    }
}
