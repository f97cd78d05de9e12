//! # Deepgram TTS
//!
//! Deepgram's REST speak endpoint. Each call posts one piece of text and
//! reads back the raw audio body, requesting headerless 8 kHz mu-law so the
//! bytes can be forwarded to the telephony leg as-is.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::json;
use tracing::{debug, error};
use url::Url;

use super::base::{AudioData, BaseTTS, TTSConfig, TTSError, TTSResult};
use super::pronunciation::PronunciationReplacer;

pub const DEEPGRAM_TTS_URL: &str = "https://api.deepgram.com/v1/speak";

/// Deepgram TTS provider implementation
pub struct DeepgramTTS {
    config: TTSConfig,
    client: reqwest::Client,
    replacer: PronunciationReplacer,
}

impl DeepgramTTS {
    /// Build the speak URL with query parameters
    pub fn build_url(config: &TTSConfig) -> TTSResult<Url> {
        let base = config.base_url.as_deref().unwrap_or(DEEPGRAM_TTS_URL);
        let mut url = Url::parse(base)
            .map_err(|e| TTSError::InvalidConfiguration(format!("Invalid base URL: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            if let Some(model) = config.voice_id.as_ref() {
                query.append_pair("model", model);
            }
            if let Some(encoding) = config.audio_format.as_ref() {
                query.append_pair("encoding", encoding);
            }
            if let Some(sample_rate) = config.sample_rate {
                query.append_pair("sample_rate", &sample_rate.to_string());
            }
            query.append_pair("container", "none");
        }

        Ok(url)
    }

    fn audio_from_bytes(&self, data: Vec<u8>) -> AudioData {
        let format = self
            .config
            .audio_format
            .clone()
            .unwrap_or_else(|| "mulaw".to_string());
        let sample_rate = self.config.sample_rate.unwrap_or(8000);
        if format == "mulaw" && sample_rate == 8000 {
            return AudioData::mulaw(data);
        }
        AudioData {
            data: data.into(),
            sample_rate,
            format,
            duration_ms: None,
        }
    }
}

#[async_trait]
impl BaseTTS for DeepgramTTS {
    fn new(config: TTSConfig) -> TTSResult<Self> {
        if config.api_key.is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "Missing API key in provider configuration".to_string(),
            ));
        }

        let timeout = Duration::from_secs(config.request_timeout.unwrap_or(10));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TTSError::ConnectionFailed(format!("Failed to build HTTP client: {e}")))?;
        let replacer = PronunciationReplacer::new(&config.pronunciations);

        Ok(Self {
            config,
            client,
            replacer,
        })
    }

    async fn synthesize(&self, text: &str) -> TTSResult<AudioData> {
        let url = Self::build_url(&self.config)?;
        let text = self.replacer.apply(text);

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("token {}", self.config.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TTSError::TimeoutError(e.to_string())
                } else {
                    TTSError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("TTS API error ({}): {}", status, error_body);
            return Err(TTSError::ProviderError(format!(
                "API error ({status}): {error_body}"
            )));
        }

        let mut data = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(item) = stream.next().await {
            let bytes = item.map_err(|e| TTSError::NetworkError(e.to_string()))?;
            data.extend_from_slice(&bytes);
        }

        if data.is_empty() {
            return Err(TTSError::AudioGenerationFailed(
                "Provider returned no audio".to_string(),
            ));
        }

        debug!("Synthesized {} bytes for '{}'", data.len(), text);
        Ok(self.audio_from_bytes(data))
    }

    fn get_config(&self) -> &TTSConfig {
        &self.config
    }

    fn get_provider_info(&self) -> &'static str {
        "Deepgram TTS REST v1"
    }
}
