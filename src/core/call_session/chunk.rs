use crate::core::tts::AudioData;

/// Origin of a reply chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Text produced by the model
    Content,
    /// Hold message spoken while a tool runs
    Filler,
    /// Spoken after a failed tool lookup
    Apology,
    /// Fixed text such as the greeting
    Scripted,
}

impl ChunkKind {
    /// Fixed phrases repeat across calls and are worth caching.
    pub fn is_fixed_phrase(&self) -> bool {
        !matches!(self, ChunkKind::Content)
    }
}

/// One independently synthesizable segment of a reply.
///
/// `index` is zero-based per reply and defines playback order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseChunk {
    pub index: usize,
    pub text: String,
    pub kind: ChunkKind,
    pub audio: Option<AudioData>,
}

impl ResponseChunk {
    pub fn new(index: usize, text: impl Into<String>, kind: ChunkKind) -> Self {
        Self {
            index,
            text: text.into(),
            kind,
            audio: None,
        }
    }
}

/// One complete unit of caller speech ready to be answered
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// Most frequent speaker tag, when the recogniser tagged words
    pub speaker_tag: Option<u32>,
    /// Every tag seen across the utterance
    pub speakers: Vec<u32>,
}

impl Utterance {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}
