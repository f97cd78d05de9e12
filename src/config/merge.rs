use std::env;
use std::str::FromStr;

use super::ServerConfig;
use super::utils::parse_bool;
use super::yaml::YamlConfig;

/// Parse an environment variable if set, naming it in the error.
fn parse_env<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid {name} environment variable: {e}")),
        Err(_) => Ok(None),
    }
}

/// Merge YAML configuration with environment variables
///
/// Priority order (highest to lowest):
/// 1. Environment variables
/// 2. YAML configuration values
/// 3. Default values
///
/// # Arguments
/// * `yaml_config` - Optional YAML configuration providing base values
pub fn merge_config(
    yaml_config: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml_config.unwrap_or_default();
    let defaults = ServerConfig::default();
    let server = yaml.server.unwrap_or_default();
    let providers = yaml.providers.unwrap_or_default();
    let conversation = yaml.conversation.unwrap_or_default();

    // Helper macro for string values: ENV > YAML > Default
    macro_rules! get_value {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            env::var($env_var)
                .ok()
                .or($yaml_value)
                .unwrap_or($default)
        };
    }

    // Helper macro for optional values: ENV > YAML
    macro_rules! get_optional {
        ($env_var:expr, $yaml_value:expr) => {
            env::var($env_var).ok().or($yaml_value)
        };
    }

    let host = get_value!("HOST", server.host, defaults.host);
    let port = parse_env::<u16>("PORT")?
        .or(server.port)
        .unwrap_or(defaults.port);

    let deepgram_api_key = get_optional!("DEEPGRAM_API_KEY", providers.deepgram_api_key);
    let openai_api_key = get_optional!("OPENAI_API_KEY", providers.openai_api_key);
    let openai_base_url = get_optional!("OPENAI_BASE_URL", providers.openai_base_url);
    let openai_model = get_value!("OPENAI_MODEL", providers.openai_model, defaults.openai_model);
    let tts_voice = get_value!("TTS_VOICE", providers.tts_voice, defaults.tts_voice);
    let stt_model = get_value!("STT_MODEL", providers.stt_model, defaults.stt_model);

    let system_prompt = get_optional!("SYSTEM_PROMPT", conversation.system_prompt);
    let greeting = get_optional!("GREETING", conversation.greeting);
    let filler_message = get_optional!("FILLER_MESSAGE", conversation.filler_message);
    let apology_message = get_optional!("APOLOGY_MESSAGE", conversation.apology_message);

    let reply_deadline_ms = parse_env::<u64>("REPLY_DEADLINE_MS")?
        .or(conversation.reply_deadline_ms)
        .unwrap_or(defaults.reply_deadline_ms);
    let assistant_speaker_tag =
        parse_env::<u32>("ASSISTANT_SPEAKER_TAG")?.or(conversation.assistant_speaker_tag);
    let require_speech_final = match env::var("REQUIRE_SPEECH_FINAL") {
        Ok(raw) => parse_bool(&raw)
            .ok_or_else(|| format!("Invalid REQUIRE_SPEECH_FINAL environment variable: {raw}"))?,
        Err(_) => conversation
            .require_speech_final
            .unwrap_or(defaults.require_speech_final),
    };
    let barge_in_min_words = parse_env::<usize>("BARGE_IN_MIN_WORDS")?
        .or(conversation.barge_in_min_words)
        .unwrap_or(defaults.barge_in_min_words);

    Ok(ServerConfig {
        host,
        port,
        deepgram_api_key,
        openai_api_key,
        openai_base_url,
        openai_model,
        tts_voice,
        stt_model,
        system_prompt,
        greeting,
        filler_message,
        apology_message,
        reply_deadline_ms,
        assistant_speaker_tag,
        require_speech_final,
        barge_in_min_words,
        pronunciations: yaml.pronunciations,
        tools: yaml.tools,
    })
}
