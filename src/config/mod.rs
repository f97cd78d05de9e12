//! Configuration module for the voxbridge server
//!
//! Server configuration comes from environment variables, optionally layered
//! over a YAML file. Environment variables always override YAML values.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use voxbridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//!
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::core::call_session::{
    AggregatorConfig, BargeInConfig, CallSessionConfig, DEFAULT_APOLOGY_MESSAGE,
    DEFAULT_FILLER_MESSAGE, DEFAULT_GREETING, DEFAULT_SYSTEM_PROMPT,
};
use crate::core::llm::LLMConfig;
use crate::core::stt::STTConfig;
use crate::core::tools::HttpToolConfig;
use crate::core::tts::{Pronunciation, TTSConfig};

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_TTS_VOICE: &str = "aura-asteria-en";
pub const DEFAULT_STT_MODEL: &str = "nova-2-phonecall";
pub const DEFAULT_REPLY_DEADLINE_MS: u64 = 30_000;

/// Server configuration
///
/// Everything needed to accept media-stream calls:
/// - Server settings (host, port)
/// - Provider credentials and models (Deepgram, OpenAI-compatible LLM)
/// - Conversation behaviour (prompt, scripted phrases, barge-in tuning)
/// - Lookup tools offered to the model (YAML only)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Providers
    pub deepgram_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_model: String,
    pub tts_voice: String,
    pub stt_model: String,

    // Conversation
    pub system_prompt: Option<String>,
    /// `Some("")` disables the greeting
    pub greeting: Option<String>,
    pub filler_message: Option<String>,
    pub apology_message: Option<String>,
    pub reply_deadline_ms: u64,
    pub assistant_speaker_tag: Option<u32>,
    pub require_speech_final: bool,
    pub barge_in_min_words: usize,

    // YAML-only sections
    pub pronunciations: Vec<Pronunciation>,
    pub tools: Vec<HttpToolConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            deepgram_api_key: None,
            openai_api_key: None,
            openai_base_url: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            tts_voice: DEFAULT_TTS_VOICE.to_string(),
            stt_model: DEFAULT_STT_MODEL.to_string(),
            system_prompt: None,
            greeting: None,
            filler_message: None,
            apology_message: None,
            reply_deadline_ms: DEFAULT_REPLY_DEADLINE_MS,
            assistant_speaker_tag: None,
            require_speech_final: false,
            barge_in_min_words: 1,
            pronunciations: Vec::new(),
            tools: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides
    ///
    /// Priority order (highest to lowest):
    /// 1. Environment variables
    /// 2. YAML file values
    /// 3. Default values
    ///
    /// The `.env` file is not read in this mode; only real environment
    /// variables override the file.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get API key for a specific provider
    ///
    /// Empty keys count as missing.
    pub fn get_api_key(&self, provider: &str) -> Result<String, String> {
        let key = match provider.to_lowercase().as_str() {
            "deepgram" => self.deepgram_api_key.as_ref(),
            "openai" => self.openai_api_key.as_ref(),
            _ => return Err(format!("Unsupported provider: {provider}")),
        };
        key.filter(|k| !k.trim().is_empty())
            .cloned()
            .ok_or_else(|| format!("{provider} API key not configured in server environment"))
    }

    /// Recognizer settings for one call
    pub fn stt_config(&self) -> Result<STTConfig, String> {
        Ok(STTConfig {
            provider: "deepgram".to_string(),
            api_key: self.get_api_key("deepgram")?,
            model: self.stt_model.clone(),
            ..Default::default()
        })
    }

    pub fn tts_config(&self) -> Result<TTSConfig, String> {
        Ok(TTSConfig {
            provider: "deepgram".to_string(),
            api_key: self.get_api_key("deepgram")?,
            voice_id: Some(self.tts_voice.clone()),
            pronunciations: self.pronunciations.clone(),
            ..Default::default()
        })
    }

    pub fn llm_config(&self) -> Result<LLMConfig, String> {
        Ok(LLMConfig {
            provider: "openai".to_string(),
            api_key: self.get_api_key("openai")?,
            model: self.openai_model.clone(),
            base_url: self.openai_base_url.clone(),
            ..Default::default()
        })
    }

    /// Conversation behaviour handed to every call session
    pub fn session_config(&self) -> CallSessionConfig {
        let greeting = match self.greeting.as_deref() {
            None => Some(DEFAULT_GREETING.to_string()),
            Some(text) if text.trim().is_empty() => None,
            Some(text) => Some(text.to_string()),
        };
        CallSessionConfig {
            system_prompt: self
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            greeting,
            filler_message: self
                .filler_message
                .clone()
                .unwrap_or_else(|| DEFAULT_FILLER_MESSAGE.to_string()),
            apology_message: self
                .apology_message
                .clone()
                .unwrap_or_else(|| DEFAULT_APOLOGY_MESSAGE.to_string()),
            reply_deadline: Duration::from_millis(self.reply_deadline_ms),
            aggregator: AggregatorConfig {
                require_speech_final: self.require_speech_final,
            },
            barge_in: BargeInConfig {
                assistant_speaker_tag: self.assistant_speaker_tag,
                min_words: self.barge_in_min_words,
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_get_api_key_success() {
        let config = ServerConfig {
            deepgram_api_key: Some("test-deepgram-key".to_string()),
            ..Default::default()
        };
        assert_eq!(config.get_api_key("deepgram").unwrap(), "test-deepgram-key");
        assert_eq!(config.get_api_key("DeepGram").unwrap(), "test-deepgram-key");
    }

    #[test]
    fn test_get_api_key_missing_or_empty() {
        let config = ServerConfig {
            openai_api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.get_api_key("deepgram").unwrap_err(),
            "deepgram API key not configured in server environment"
        );
        assert!(config.get_api_key("openai").is_err());
    }

    #[test]
    fn test_get_api_key_unsupported_provider() {
        let config = ServerConfig::default();
        assert_eq!(
            config.get_api_key("elevenlabs").unwrap_err(),
            "Unsupported provider: elevenlabs"
        );
    }

    #[test]
    fn test_session_config_defaults() {
        let session = ServerConfig::default().session_config();
        assert_eq!(session.greeting.as_deref(), Some(DEFAULT_GREETING));
        assert_eq!(session.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(session.reply_deadline, Duration::from_secs(30));
        assert_eq!(session.barge_in.min_words, 1);
        assert!(!session.aggregator.require_speech_final);
    }

    #[test]
    fn test_session_config_empty_greeting_disables_it() {
        let config = ServerConfig {
            greeting: Some(String::new()),
            assistant_speaker_tag: Some(0),
            ..Default::default()
        };
        let session = config.session_config();
        assert_eq!(session.greeting, None);
        assert_eq!(session.barge_in.assistant_speaker_tag, Some(0));
    }

    #[test]
    fn test_provider_configs_carry_settings() {
        let config = ServerConfig {
            deepgram_api_key: Some("dg".to_string()),
            openai_api_key: Some("sk".to_string()),
            openai_base_url: Some("http://localhost:8080/v1".to_string()),
            tts_voice: "aura-orion-en".to_string(),
            ..Default::default()
        };
        assert_eq!(config.stt_config().unwrap().api_key, "dg");
        assert_eq!(
            config.tts_config().unwrap().voice_id.as_deref(),
            Some("aura-orion-en")
        );
        let llm = config.llm_config().unwrap();
        assert_eq!(llm.model, DEFAULT_OPENAI_MODEL);
        assert_eq!(llm.base_url.as_deref(), Some("http://localhost:8080/v1"));
    }

    #[test]
    #[serial]
    fn test_from_file_env_overrides_yaml() {
        utils::clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
server:
  host: "127.0.0.1"
  port: 4000
providers:
  deepgram_api_key: "yaml-deepgram"
  openai_model: "gpt-4o-mini"
conversation:
  greeting: "Hello from YAML"
  barge_in_min_words: 2
tools:
  - name: get_company_info
    description: Look up company details
    url: "https://example.com/company"
"#,
        )
        .unwrap();

        unsafe {
            env::set_var("PORT", "5000");
            env::set_var("OPENAI_MODEL", "gpt-4.1");
        }
        let config = ServerConfig::from_file(&config_path).unwrap();
        unsafe {
            env::remove_var("PORT");
            env::remove_var("OPENAI_MODEL");
        }

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5000);
        assert_eq!(config.openai_model, "gpt-4.1");
        assert_eq!(config.deepgram_api_key.as_deref(), Some("yaml-deepgram"));
        assert_eq!(config.greeting.as_deref(), Some("Hello from YAML"));
        assert_eq!(config.barge_in_min_words, 2);
        assert_eq!(config.tools.len(), 1);
        assert_eq!(config.tools[0].timeout_seconds, 5);
    }

    #[test]
    #[serial]
    fn test_from_file_rejects_invalid_tool_url() {
        utils::clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
tools:
  - name: lookup
    description: Broken
    url: "not a url"
"#,
        )
        .unwrap();

        let result = ServerConfig::from_file(&config_path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("lookup"));
    }

    #[test]
    fn test_address() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.address(), "127.0.0.1:8080");
    }
}
