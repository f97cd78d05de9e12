//! Messages delivered to the session task.

use super::chunk::ResponseChunk;
use crate::core::llm::LLMError;
use crate::core::stt::{STTError, TranscriptEvent};
use crate::core::tts::TTSError;

#[derive(Debug)]
pub(crate) enum SessionEvent {
    Transcript(TranscriptEvent),
    TranscriptionFailed(STTError),
    /// The far end finished playing the segment tagged with this label
    MarkPlayed(String),
    Chunk {
        generation: u64,
        chunk: ResponseChunk,
    },
    Synthesized {
        generation: u64,
        chunk: ResponseChunk,
    },
    SynthesisFailed {
        generation: u64,
        index: usize,
        error: TTSError,
    },
    /// The reply produced exactly `total` chunks
    ReplyCompleted {
        generation: u64,
        total: usize,
    },
    /// The reply gave up after emitting `emitted` chunks
    ReplyFailed {
        generation: u64,
        emitted: usize,
        error: LLMError,
    },
    Stop,
}
