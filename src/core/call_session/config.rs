//! Configuration types for CallSession

use std::time::Duration;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful phone assistant called Emma. \
Keep your responses short and to the point. This is a spoken conversation with a person, \
so keep it natural and casual. Insert a '•' symbol every 5 to 10 words at natural pauses \
where your response can be split for text to speech.";
pub const DEFAULT_GREETING: &str = "Hi, my name is Emma. How can I help you?";
pub const DEFAULT_FILLER_MESSAGE: &str = "Could you wait while I check the info?";
pub const DEFAULT_APOLOGY_MESSAGE: &str =
    "Sorry, I couldn't look that up right now. Is there anything else I can help with?";
pub const DEFAULT_BOUNDARY_MARKER: &str = "•";

/// How finished utterances are detected from the transcript stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatorConfig {
    /// Join `is_final` segments and cut only on `is_speech_final`
    pub require_speech_final: bool,
}

/// When caller speech counts as an interruption.
#[derive(Debug, Clone, PartialEq)]
pub struct BargeInConfig {
    /// Speaker tag the recogniser assigns to the assistant's own audio
    pub assistant_speaker_tag: Option<u32>,
    /// Minimum words before caller speech interrupts playback
    pub min_words: usize,
}

impl Default for BargeInConfig {
    fn default() -> Self {
        Self {
            assistant_speaker_tag: None,
            min_words: 1,
        }
    }
}

/// Per-call behaviour of the conversation pipeline.
#[derive(Debug, Clone)]
pub struct CallSessionConfig {
    pub system_prompt: String,
    /// Spoken when the stream starts; `None` waits silently for the caller
    pub greeting: Option<String>,
    /// Spoken while a tool lookup runs
    pub filler_message: String,
    /// Spoken when a tool lookup fails
    pub apology_message: String,
    /// Soft boundary the model inserts between speakable segments
    pub boundary_marker: String,
    /// Upper bound from utterance to the last chunk being released
    pub reply_deadline: Duration,
    /// Upper bound on a single synthesis
    pub synthesis_timeout: Duration,
    /// Tool round-trips allowed per utterance
    pub max_tool_rounds: usize,
    pub aggregator: AggregatorConfig,
    pub barge_in: BargeInConfig,
}

impl Default for CallSessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            greeting: Some(DEFAULT_GREETING.to_string()),
            filler_message: DEFAULT_FILLER_MESSAGE.to_string(),
            apology_message: DEFAULT_APOLOGY_MESSAGE.to_string(),
            boundary_marker: DEFAULT_BOUNDARY_MARKER.to_string(),
            reply_deadline: Duration::from_secs(30),
            synthesis_timeout: Duration::from_secs(10),
            max_tool_rounds: 1,
            aggregator: AggregatorConfig::default(),
            barge_in: BargeInConfig::default(),
        }
    }
}
