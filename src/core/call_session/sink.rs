use async_trait::async_trait;

use super::errors::SinkError;
use crate::core::tts::AudioData;

/// Outbound half of the media stream
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Send one audio segment followed by a mark labelled `mark`.
    ///
    /// The far end echoes the mark back once the segment has played.
    async fn send_audio(&self, audio: &AudioData, mark: &str) -> Result<(), SinkError>;

    /// Drop any audio the far end has buffered but not yet played
    async fn clear(&self) -> Result<(), SinkError>;
}
