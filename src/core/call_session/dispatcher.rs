//! Synthesis dispatch.
//!
//! Every chunk is synthesized in its own task as soon as it arrives, so a
//! slow chunk never holds back the ones after it. Ordering is restored
//! later by the playback buffer.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::chunk::ResponseChunk;
use super::events::SessionEvent;
use crate::core::tts::{AudioData, BoxedTTS, SynthesisCache, TTSError, TTSResult};

#[derive(Clone)]
pub struct SynthesisDispatcher {
    tts: BoxedTTS,
    cache: SynthesisCache,
    timeout: Duration,
}

impl SynthesisDispatcher {
    pub fn new(tts: BoxedTTS, cache: SynthesisCache, timeout: Duration) -> Self {
        Self { tts, cache, timeout }
    }

    fn voice(&self) -> &str {
        self.tts.get_config().voice_id.as_deref().unwrap_or_default()
    }

    /// Start synthesizing `chunk`.
    ///
    /// Returns false when the chunk has no speakable text; nothing is
    /// spawned and the caller must account for the index itself. A
    /// cancelled synthesis reports nothing.
    pub(crate) fn dispatch(
        &self,
        generation: u64,
        chunk: ResponseChunk,
        cancel: CancellationToken,
        events: mpsc::Sender<SessionEvent>,
    ) -> bool {
        if chunk.text.trim().is_empty() {
            debug!(generation, index = chunk.index, "Not dispatching empty chunk");
            return false;
        }

        let dispatcher = self.clone();
        tokio::spawn(async move {
            let index = chunk.index;
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(generation, index, "Synthesis cancelled");
                    return;
                }
                result = dispatcher.synthesize(&chunk) => result,
            };
            if cancel.is_cancelled() {
                return;
            }

            let event = match result {
                Ok(audio) => SessionEvent::Synthesized {
                    generation,
                    chunk: ResponseChunk {
                        audio: Some(audio),
                        ..chunk
                    },
                },
                Err(error) => SessionEvent::SynthesisFailed {
                    generation,
                    index,
                    error,
                },
            };
            let _ = events.send(event).await;
        });
        true
    }

    async fn synthesize(&self, chunk: &ResponseChunk) -> TTSResult<AudioData> {
        let cacheable = chunk.kind.is_fixed_phrase();
        if cacheable && let Some(audio) = self.cache.get(self.voice(), &chunk.text).await {
            return Ok(audio);
        }

        let audio = tokio::time::timeout(self.timeout, self.tts.synthesize(&chunk.text))
            .await
            .map_err(|_| {
                TTSError::TimeoutError(format!(
                    "Synthesis exceeded {} ms",
                    self.timeout.as_millis()
                ))
            })??;

        if cacheable {
            self.cache
                .insert(self.voice(), &chunk.text, audio.clone())
                .await;
        }
        Ok(audio)
    }
}
