use serde::Deserialize;
use std::path::PathBuf;

use crate::core::tools::HttpToolConfig;
use crate::core::tts::Pronunciation;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Environment
/// variables can override any scalar value; `pronunciations` and `tools`
/// exist only here.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///
/// providers:
///   deepgram_api_key: "your-deepgram-key"
///   openai_api_key: "your-openai-key"
///   openai_base_url: "https://api.openai.com/v1"
///   openai_model: "gpt-4o"
///   tts_voice: "aura-asteria-en"
///   stt_model: "nova-2-phonecall"
///
/// conversation:
///   system_prompt: "You are Emma..."
///   greeting: "Hi, my name is Emma. How can I help you?"
///   filler_message: "Could you wait while I check the info?"
///   apology_message: "Sorry, I couldn't look that up."
///   reply_deadline_ms: 30000
///   require_speech_final: false
///   assistant_speaker_tag: 0
///   barge_in_min_words: 1
///
/// pronunciations:
///   - word: "Acme"
///     pronunciation: "Ack me"
///
/// tools:
///   - name: "get_company_info"
///     description: "Look up company contact details"
///     url: "https://api.example.com/company"
///     timeout_seconds: 5
///     parameters:
///       type: object
///       properties:
///         company: { type: string }
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub providers: Option<ProvidersYaml>,
    pub conversation: Option<ConversationYaml>,
    pub pronunciations: Vec<Pronunciation>,
    pub tools: Vec<HttpToolConfig>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Provider credentials and models from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    pub deepgram_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Any endpoint speaking the chat-completions protocol
    pub openai_base_url: Option<String>,
    pub openai_model: Option<String>,
    pub tts_voice: Option<String>,
    pub stt_model: Option<String>,
}

/// Conversation behaviour from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ConversationYaml {
    pub system_prompt: Option<String>,
    pub greeting: Option<String>,
    pub filler_message: Option<String>,
    pub apology_message: Option<String>,
    pub reply_deadline_ms: Option<u64>,
    pub require_speech_final: Option<bool>,
    pub assistant_speaker_tag: Option<u32>,
    pub barge_in_min_words: Option<usize>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;
        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {e}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_yaml(contents: &str) -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, contents).unwrap();
        (temp_dir, path)
    }

    #[test]
    fn test_load_full_yaml() {
        let (_dir, path) = write_yaml(
            r#"
server:
  host: "127.0.0.1"
  port: 8080
providers:
  deepgram_api_key: "dg-key"
  openai_model: "gpt-4o-mini"
conversation:
  greeting: ""
  assistant_speaker_tag: 0
pronunciations:
  - word: "SQL"
    pronunciation: "sequel"
tools:
  - name: get_company_info
    description: Company details
    url: "https://example.com/info"
    parameters:
      type: object
      properties:
        company:
          type: string
"#,
        );

        let config = YamlConfig::from_file(&path).unwrap();
        let server = config.server.unwrap();
        assert_eq!(server.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(server.port, Some(8080));

        let providers = config.providers.unwrap();
        assert_eq!(providers.deepgram_api_key.as_deref(), Some("dg-key"));
        assert_eq!(providers.openai_model.as_deref(), Some("gpt-4o-mini"));

        let conversation = config.conversation.unwrap();
        assert_eq!(conversation.greeting.as_deref(), Some(""));
        assert_eq!(conversation.assistant_speaker_tag, Some(0));

        assert_eq!(config.pronunciations[0].pronunciation, "sequel");
        assert_eq!(config.tools.len(), 1);
        assert_eq!(
            config.tools[0].parameters["properties"]["company"]["type"],
            "string"
        );
    }

    #[test]
    fn test_load_empty_yaml() {
        let (_dir, path) = write_yaml("");
        let config = YamlConfig::from_file(&path).unwrap();
        assert!(config.server.is_none());
        assert!(config.tools.is_empty());
    }

    #[test]
    fn test_load_malformed_yaml() {
        let (_dir, path) = write_yaml("server: [unclosed");
        let err = YamlConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_missing_file() {
        let err = YamlConfig::from_file(&PathBuf::from("/nonexistent/voxbridge.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
