//! Barge-in detection.
//!
//! While the assistant is audible, the recogniser also hears the phone line
//! echoing the assistant's own voice. Speaker tags separate the two: speech
//! attributed only to the assistant's tag is echo; anything else with
//! enough words is the caller talking over the reply.

use tracing::debug;

use super::chunk::Utterance;
use super::config::BargeInConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BargeInDecision {
    /// Caller is talking over the reply
    Interrupt,
    /// Recogniser picked up the assistant's own audio
    SelfEcho,
    /// Too short to act on
    Trivial,
}

#[derive(Debug, Clone, Default)]
pub struct BargeInCoordinator {
    config: BargeInConfig,
}

impl BargeInCoordinator {
    pub fn new(config: BargeInConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, utterance: &Utterance) -> BargeInDecision {
        if let Some(assistant_tag) = self.config.assistant_speaker_tag
            && !utterance.speakers.is_empty()
            && utterance.speakers.iter().all(|tag| *tag == assistant_tag)
        {
            debug!("Ignoring echo of assistant audio: {}", utterance.text);
            return BargeInDecision::SelfEcho;
        }

        if utterance.word_count() < self.config.min_words.max(1) {
            debug!("Ignoring short speech during playback: {}", utterance.text);
            return BargeInDecision::Trivial;
        }

        BargeInDecision::Interrupt
    }
}
