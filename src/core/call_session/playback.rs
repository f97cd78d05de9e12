//! Ordered playback buffer.
//!
//! Syntheses finish in any order. The buffer holds each result under its
//! chunk index and releases strictly in ascending, gapless order: a chunk
//! goes out only when every lower index has either gone out or been
//! skipped. Every released segment is followed by a mark; the set of
//! outstanding marks is what tells the session the caller is still hearing
//! the assistant.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use super::errors::SinkError;
use super::sink::AudioSink;
use crate::core::tts::AudioData;

/// Acknowledgement token correlating a sent segment with its playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mark {
    pub label: String,
    pub generation: u64,
    pub index: usize,
}

impl Mark {
    fn new(generation: u64, index: usize) -> Self {
        Self {
            label: Uuid::new_v4().to_string(),
            generation,
            index,
        }
    }
}

enum Slot {
    Ready(AudioData),
    Skipped,
}

pub struct PlaybackBuffer {
    sink: Arc<dyn AudioSink>,
    generation: u64,
    held: BTreeMap<usize, Slot>,
    next_expected: usize,
    /// Total chunk count once the reply stops producing chunks
    sealed: Option<usize>,
    marks: VecDeque<Mark>,
}

impl PlaybackBuffer {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self {
            sink,
            generation: 0,
            held: BTreeMap::new(),
            next_expected: 0,
            sealed: Some(0),
            marks: VecDeque::new(),
        }
    }

    /// Start accepting chunks for a new reply.
    pub fn begin(&mut self, generation: u64) {
        if !self.held.is_empty() {
            warn!(
                generation = self.generation,
                "Discarding {} held chunks at start of next reply",
                self.held.len()
            );
        }
        self.generation = generation;
        self.held.clear();
        self.next_expected = 0;
        self.sealed = None;
    }

    pub fn next_expected(&self) -> usize {
        self.next_expected
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    pub fn outstanding_marks(&self) -> usize {
        self.marks.len()
    }

    fn accepts(&self, generation: u64, index: usize) -> bool {
        if generation != self.generation {
            debug!(generation, current = self.generation, index, "Dropping stale chunk");
            return false;
        }
        if index < self.next_expected || self.held.contains_key(&index) {
            warn!(generation, index, "Dropping duplicate chunk");
            return false;
        }
        if let Some(total) = self.sealed
            && index >= total
        {
            debug!(generation, index, total, "Dropping chunk past end of reply");
            return false;
        }
        true
    }

    /// Hold a synthesized chunk and release whatever became contiguous.
    ///
    /// Returns the number of segments sent to the sink.
    pub async fn submit(
        &mut self,
        generation: u64,
        index: usize,
        audio: AudioData,
    ) -> Result<usize, SinkError> {
        if !self.accepts(generation, index) {
            return Ok(0);
        }
        self.held.insert(index, Slot::Ready(audio));
        self.release_ready().await
    }

    /// Record that a chunk will never produce audio.
    pub async fn skip(&mut self, generation: u64, index: usize) -> Result<usize, SinkError> {
        if !self.accepts(generation, index) {
            return Ok(0);
        }
        self.held.insert(index, Slot::Skipped);
        self.release_ready().await
    }

    async fn release_ready(&mut self) -> Result<usize, SinkError> {
        let mut sent = 0;
        while let Some(slot) = self.held.remove(&self.next_expected) {
            let index = self.next_expected;
            if let Slot::Ready(audio) = slot {
                let mark = Mark::new(self.generation, index);
                self.sink.send_audio(&audio, &mark.label).await?;
                debug!(
                    generation = self.generation,
                    index,
                    mark = %mark.label,
                    "Released chunk ({} bytes)",
                    audio.data.len()
                );
                self.marks.push_back(mark);
                sent += 1;
            } else {
                debug!(generation = self.generation, index, "Skipped chunk");
            }
            self.next_expected += 1;
        }
        Ok(sent)
    }

    /// Fix the reply's chunk count. Further calls are ignored.
    pub fn seal(&mut self, generation: u64, total: usize) {
        if generation != self.generation || self.sealed.is_some() {
            return;
        }
        let total = total.max(self.next_expected);
        self.held.retain(|index, _| *index < total);
        self.sealed = Some(total);
    }

    /// End the reply at the current position, discarding held chunks.
    ///
    /// Audio already released keeps playing.
    pub fn truncate(&mut self, generation: u64) {
        if generation != self.generation {
            return;
        }
        if !self.held.is_empty() {
            debug!(generation, "Discarding {} held chunks", self.held.len());
        }
        self.held.clear();
        self.sealed = Some(self.next_expected);
    }

    /// Remove the mark with `label`; false if it was not outstanding.
    pub fn acknowledge(&mut self, label: &str) -> bool {
        match self.marks.iter().position(|mark| mark.label == label) {
            Some(position) => {
                if position != 0 {
                    debug!(label, position, "Mark acknowledged out of order");
                }
                self.marks.remove(position);
                true
            }
            None => {
                warn!(label, "Acknowledgement for unknown mark");
                false
            }
        }
    }

    /// Stop everything: drop held chunks and outstanding marks and tell the
    /// sink to discard buffered audio.
    ///
    /// The buffer refuses chunks until the next [`PlaybackBuffer::begin`].
    pub async fn flush(&mut self) -> Result<(), SinkError> {
        debug!(
            generation = self.generation,
            held = self.held.len(),
            marks = self.marks.len(),
            "Flushing playback"
        );
        self.held.clear();
        self.marks.clear();
        self.next_expected = 0;
        self.sealed = Some(0);
        self.sink.clear().await
    }

    /// Every chunk of the sealed reply has been sent or skipped.
    pub fn is_fully_released(&self) -> bool {
        self.sealed
            .is_some_and(|total| self.next_expected >= total)
    }

    /// Nothing left to send and nothing still audible.
    pub fn is_drained(&self) -> bool {
        self.is_fully_released() && self.marks.is_empty()
    }
}
