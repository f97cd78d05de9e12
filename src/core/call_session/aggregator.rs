//! Transcript aggregation.
//!
//! Turns the recogniser's stream of interim and final events into discrete
//! utterances, taking the session's speaking state into account.

use tracing::debug;

use super::chunk::Utterance;
use super::config::AggregatorConfig;
use super::state::SpeakingState;
use crate::core::stt::TranscriptEvent;

/// What the session should do with one transcript event
#[derive(Debug, Clone, PartialEq)]
pub enum AggregatorDecision {
    /// Nothing to act on
    Ignore,
    /// Answer this utterance
    Respond(Utterance),
    /// Speech arrived while the assistant is audible; let the barge-in
    /// coordinator decide
    PossibleBargeIn(Utterance),
}

#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    config: AggregatorConfig,
    segments: Vec<String>,
    segment_speakers: Vec<u32>,
}

impl TranscriptAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            segments: Vec::new(),
            segment_speakers: Vec::new(),
        }
    }

    /// Consume one event in arrival order.
    pub fn observe(&mut self, event: &TranscriptEvent, state: &SpeakingState) -> AggregatorDecision {
        if event.utterance_end {
            if !self.segments.is_empty() {
                debug!("Utterance ended without a turn, dropping: {}", self.segments.join(" "));
            }
            self.reset();
            return AggregatorDecision::Ignore;
        }
        if !event.is_final {
            debug!("Interim transcript: {}", event.text);
            return AggregatorDecision::Ignore;
        }

        let Some(utterance) = self.complete_utterance(event) else {
            return AggregatorDecision::Ignore;
        };

        match state {
            SpeakingState::Listening => AggregatorDecision::Respond(utterance),
            SpeakingState::Replying {
                playback_started: false,
                generation,
            } => {
                debug!(
                    generation,
                    "Discarding final transcript while reply is pending: {}", utterance.text
                );
                AggregatorDecision::Ignore
            }
            SpeakingState::Replying {
                playback_started: true,
                ..
            } => AggregatorDecision::PossibleBargeIn(utterance),
        }
    }

    fn complete_utterance(&mut self, event: &TranscriptEvent) -> Option<Utterance> {
        let text = event.text.trim();

        if !self.config.require_speech_final {
            if text.is_empty() {
                return None;
            }
            return Some(Utterance {
                text: text.to_string(),
                speaker_tag: event.primary_speaker(),
                speakers: event.speakers.clone(),
            });
        }

        if !text.is_empty() {
            self.segments.push(text.to_string());
            self.segment_speakers.extend_from_slice(&event.speakers);
        }
        if !event.is_speech_final {
            return None;
        }

        let text = self.segments.join(" ");
        let speakers = std::mem::take(&mut self.segment_speakers);
        self.segments.clear();
        if text.is_empty() {
            return None;
        }

        let joined = TranscriptEvent::new(text, true, true, event.confidence).with_speakers(speakers);
        Some(Utterance {
            speaker_tag: joined.primary_speaker(),
            speakers: joined.speakers,
            text: joined.text,
        })
    }

    /// A reply has been started for the last utterance; speech collected
    /// so far belongs to it.
    pub fn reply_started(&mut self) {
        if !self.segments.is_empty() {
            debug!("Dropping {} segments collected before reply", self.segments.len());
        }
        self.reset();
    }

    /// Drop any partially collected utterance.
    pub fn reset(&mut self) {
        self.segments.clear();
        self.segment_speakers.clear();
    }
}
