//! # Call Session
//!
//! Turn-taking and ordered audio delivery for one phone call.
//!
//! Final transcripts become utterances ([`TranscriptAggregator`]); each
//! utterance starts a reply whose model output is cut into chunks
//! ([`ResponseStreamer`]); chunks are synthesized concurrently
//! ([`SynthesisDispatcher`]) and reassembled in order by the
//! [`PlaybackBuffer`], which tags every segment with a mark. Caller speech
//! during playback cancels the reply and starts a new one
//! ([`BargeInCoordinator`]). [`CallSession`] wires these together on a
//! single task.

pub mod aggregator;
pub mod barge_in;
pub mod chunk;
pub mod config;
pub mod conversation;
pub mod dispatcher;
pub mod errors;
pub(crate) mod events;
pub mod playback;
pub mod session;
pub mod sink;
pub mod state;
pub mod streamer;

#[cfg(test)]
mod tests;

pub use aggregator::{AggregatorDecision, TranscriptAggregator};
pub use barge_in::{BargeInCoordinator, BargeInDecision};
pub use chunk::{ChunkKind, ResponseChunk, Utterance};
pub use config::{
    AggregatorConfig, BargeInConfig, CallSessionConfig, DEFAULT_APOLOGY_MESSAGE,
    DEFAULT_BOUNDARY_MARKER, DEFAULT_FILLER_MESSAGE, DEFAULT_GREETING, DEFAULT_SYSTEM_PROMPT,
};
pub use conversation::Conversation;
pub use dispatcher::SynthesisDispatcher;
pub use errors::{CallSessionError, CallSessionResult, SinkError};
pub use playback::{Mark, PlaybackBuffer};
pub use session::{CallSession, CallSessionHandle, SessionProviders};
pub use sink::AudioSink;
pub use state::{SessionSnapshot, SpeakingState};
pub use streamer::{ChunkCutter, ResponseStreamer};
