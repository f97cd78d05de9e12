/// Parse a boolean value from a string, supporting multiple formats
///
/// Accepts: "true", "false", "1", "0", "yes", "no", "on", "off" (case insensitive)
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Every environment variable the server reads
#[cfg(test)]
pub const ENV_KEYS: &[&str] = &[
    "HOST",
    "PORT",
    "DEEPGRAM_API_KEY",
    "OPENAI_API_KEY",
    "OPENAI_BASE_URL",
    "OPENAI_MODEL",
    "TTS_VOICE",
    "STT_MODEL",
    "SYSTEM_PROMPT",
    "GREETING",
    "FILLER_MESSAGE",
    "APOLOGY_MESSAGE",
    "REPLY_DEADLINE_MS",
    "ASSISTANT_SPEAKER_TAG",
    "REQUIRE_SPEECH_FINAL",
    "BARGE_IN_MIN_WORDS",
];

/// Remove every server variable so tests start from defaults
#[cfg(test)]
pub fn clear_env() {
    for key in ENV_KEYS {
        unsafe {
            std::env::remove_var(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_true_variants() {
        for value in ["true", "TRUE", "1", "yes", "Yes", "on", " true "] {
            assert_eq!(parse_bool(value), Some(true), "{value}");
        }
    }

    #[test]
    fn test_parse_bool_false_variants() {
        for value in ["false", "FALSE", "0", "no", "NO", "off"] {
            assert_eq!(parse_bool(value), Some(false), "{value}");
        }
    }

    #[test]
    fn test_parse_bool_invalid() {
        assert_eq!(parse_bool("invalid"), None);
        assert_eq!(parse_bool("2"), None);
        assert_eq!(parse_bool(""), None);
    }
}
