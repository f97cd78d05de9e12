//! Reply generation.
//!
//! One reply task per utterance. It streams the model's answer, cuts it
//! into speakable chunks at the boundary marker and handles at most
//! `max_tool_rounds` tool round-trips. Several tool calls requested in one
//! model turn run one after another.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::chunk::{ChunkKind, ResponseChunk, Utterance};
use super::config::CallSessionConfig;
use super::conversation::Conversation;
use super::events::SessionEvent;
use crate::core::llm::{BoxedLLM, ChatMessage, LLMError, LLMEvent, ToolInvocation};
use crate::core::tools::ToolRegistry;

/// Splits streamed text at a boundary marker.
#[derive(Debug)]
pub struct ChunkCutter {
    marker: String,
    pending: String,
}

impl ChunkCutter {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            pending: String::new(),
        }
    }

    /// Add a fragment; returns every piece completed by it.
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        self.pending.push_str(fragment);
        let mut pieces = Vec::new();
        if self.marker.is_empty() {
            return pieces;
        }
        while let Some(pos) = self.pending.find(&self.marker) {
            let piece = self.pending[..pos].trim().to_string();
            self.pending.drain(..pos + self.marker.len());
            if !piece.is_empty() {
                pieces.push(piece);
            }
        }
        pieces
    }

    /// Whatever is left once the stream ends.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }
}

/// Why a reply ended early
#[derive(Debug)]
struct ReplyFailure {
    emitted: usize,
    error: LLMError,
}

/// Numbers chunks and forwards them to the session.
struct ChunkEmitter {
    generation: u64,
    next_index: usize,
    events: mpsc::Sender<SessionEvent>,
}

impl ChunkEmitter {
    async fn emit(&mut self, text: String, kind: ChunkKind) -> Result<(), ReplyFailure> {
        let chunk = ResponseChunk::new(self.next_index, text, kind);
        debug!(
            generation = self.generation,
            index = chunk.index,
            kind = ?kind,
            "Emitting chunk: {}",
            chunk.text
        );
        self.events
            .send(SessionEvent::Chunk {
                generation: self.generation,
                chunk,
            })
            .await
            .map_err(|_| self.fail(LLMError::StreamInterrupted("session closed".to_string())))?;
        self.next_index += 1;
        Ok(())
    }

    fn fail(&self, error: LLMError) -> ReplyFailure {
        ReplyFailure {
            emitted: self.next_index,
            error,
        }
    }
}

/// Produces the chunks of one reply.
#[derive(Clone)]
pub struct ResponseStreamer {
    llm: BoxedLLM,
    tools: Arc<ToolRegistry>,
    conversation: Conversation,
    filler_message: String,
    apology_message: String,
    boundary_marker: String,
    max_tool_rounds: usize,
}

impl ResponseStreamer {
    pub fn new(
        llm: BoxedLLM,
        tools: Arc<ToolRegistry>,
        conversation: Conversation,
        config: &CallSessionConfig,
    ) -> Self {
        Self {
            llm,
            tools,
            conversation,
            filler_message: config.filler_message.clone(),
            apology_message: config.apology_message.clone(),
            boundary_marker: config.boundary_marker.clone(),
            max_tool_rounds: config.max_tool_rounds,
        }
    }

    /// Start the reply for `utterance` under `generation`.
    ///
    /// Ends with exactly one `ReplyCompleted` or `ReplyFailed`, unless
    /// `cancel` fires first, in which case nothing more is sent.
    pub(crate) fn spawn(
        &self,
        generation: u64,
        utterance: Utterance,
        cancel: CancellationToken,
        events: mpsc::Sender<SessionEvent>,
    ) -> JoinHandle<()> {
        let streamer = self.clone();
        tokio::spawn(async move {
            let mut emitter = ChunkEmitter {
                generation,
                next_index: 0,
                events: events.clone(),
            };

            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(generation, "Reply cancelled");
                    return;
                }
                outcome = streamer.produce(generation, &utterance, &mut emitter) => outcome,
            };

            let event = match outcome {
                Ok(total) => {
                    info!(generation, total, "Reply complete");
                    SessionEvent::ReplyCompleted { generation, total }
                }
                Err(failure) => {
                    warn!(
                        generation,
                        emitted = failure.emitted,
                        "Reply failed: {}",
                        failure.error
                    );
                    SessionEvent::ReplyFailed {
                        generation,
                        emitted: failure.emitted,
                        error: failure.error,
                    }
                }
            };
            if !cancel.is_cancelled() {
                let _ = events.send(event).await;
            }
        })
    }

    async fn produce(
        &self,
        generation: u64,
        utterance: &Utterance,
        emitter: &mut ChunkEmitter,
    ) -> Result<usize, ReplyFailure> {
        self.conversation
            .append(generation, ChatMessage::user(utterance.text.clone()));

        let mut tool_rounds = 0;
        loop {
            let offer_tools = tool_rounds < self.max_tool_rounds && !self.tools.is_empty();
            let calls = self.stream_round(generation, offer_tools, emitter).await?;
            if calls.is_empty() {
                return Ok(emitter.next_index);
            }
            tool_rounds += 1;

            for call in calls {
                if !self.run_tool(generation, &call, emitter).await? {
                    return Ok(emitter.next_index);
                }
            }
        }
    }

    /// Speak the hold message and perform one lookup. Returns false when
    /// the lookup failed and the reply ended with an apology.
    async fn run_tool(
        &self,
        generation: u64,
        call: &ToolInvocation,
        emitter: &mut ChunkEmitter,
    ) -> Result<bool, ReplyFailure> {
        emitter
            .emit(self.filler_message.clone(), ChunkKind::Filler)
            .await?;
        self.conversation
            .append(generation, ChatMessage::assistant(self.filler_message.clone()));

        info!(generation, tool = %call.name, "Invoking tool");
        match self.tools.invoke(call).await {
            Ok(result) => {
                self.conversation
                    .append(generation, tool_result_message(call, &result));
                Ok(true)
            }
            Err(e) => {
                warn!(generation, tool = %call.name, "Tool lookup failed: {}", e);
                emitter
                    .emit(self.apology_message.clone(), ChunkKind::Apology)
                    .await?;
                self.conversation
                    .append(generation, ChatMessage::assistant(self.apology_message.clone()));
                Ok(false)
            }
        }
    }

    /// Run one model completion. Returns the tool calls it requested.
    async fn stream_round(
        &self,
        generation: u64,
        offer_tools: bool,
        emitter: &mut ChunkEmitter,
    ) -> Result<Vec<ToolInvocation>, ReplyFailure> {
        let tools = if offer_tools {
            self.tools.definitions()
        } else {
            Vec::new()
        };
        let messages = self.conversation.snapshot();
        let mut stream = self
            .llm
            .stream_chat(&messages, &tools)
            .await
            .map_err(|e| emitter.fail(e))?;

        let mut cutter = ChunkCutter::new(self.boundary_marker.clone());
        let mut spoken = Vec::new();
        let mut calls = Vec::new();
        let mut done = false;

        while let Some(event) = stream.recv().await {
            match event.map_err(|e| emitter.fail(e))? {
                LLMEvent::Content(fragment) => {
                    for piece in cutter.push(&fragment) {
                        spoken.push(piece.clone());
                        emitter.emit(piece, ChunkKind::Content).await?;
                    }
                }
                LLMEvent::ToolCall(call) if offer_tools => calls.push(call),
                LLMEvent::ToolCall(call) => {
                    warn!(generation, tool = %call.name, "Ignoring tool call that was not offered");
                }
                LLMEvent::Done => {
                    done = true;
                    break;
                }
            }
        }
        if !done {
            return Err(emitter.fail(LLMError::StreamInterrupted(
                "stream ended before completion".to_string(),
            )));
        }

        if let Some(rest) = cutter.finish() {
            spoken.push(rest.clone());
            emitter.emit(rest, ChunkKind::Content).await?;
        }
        if !spoken.is_empty() {
            self.conversation
                .append(generation, ChatMessage::assistant(spoken.join(" ")));
        }
        Ok(calls)
    }
}

fn tool_result_message(call: &ToolInvocation, result: &serde_json::Value) -> ChatMessage {
    ChatMessage::system(format!("{} result: {}", call.name, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutter_splits_on_marker() {
        let mut cutter = ChunkCutter::new("•");
        assert!(cutter.push("We open at").is_empty());
        assert_eq!(cutter.push(" nine • and close"), vec!["We open at nine"]);
        assert_eq!(cutter.push(" at five •• "), vec!["and close at five"]);
        assert_eq!(cutter.finish(), None);
    }

    #[test]
    fn test_cutter_marker_split_across_fragments() {
        let mut cutter = ChunkCutter::new("<br>");
        assert!(cutter.push("one <b").is_empty());
        assert_eq!(cutter.push("r> two"), vec!["one"]);
        assert_eq!(cutter.finish(), Some("two".to_string()));
    }

    #[test]
    fn test_cutter_without_marker_yields_whole_text() {
        let mut cutter = ChunkCutter::new("•");
        assert!(cutter.push("Sure, one moment.").is_empty());
        assert_eq!(cutter.finish(), Some("Sure, one moment.".to_string()));
    }

    #[test]
    fn test_cutter_whitespace_only_is_dropped() {
        let mut cutter = ChunkCutter::new("•");
        assert!(cutter.push("  •  ").is_empty());
        assert_eq!(cutter.finish(), None);
    }

    #[test]
    fn test_tool_result_message() {
        let call = ToolInvocation {
            id: "call_1".to_string(),
            name: "get_company_info".to_string(),
            arguments: serde_json::json!({}),
        };
        let message = tool_result_message(&call, &serde_json::json!({"phone": "555"}));
        assert_eq!(message.content, r#"get_company_info result: {"phone":"555"}"#);
    }
}
