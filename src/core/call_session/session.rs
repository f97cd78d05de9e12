//! The per-call event loop.
//!
//! A [`CallSession`] owns everything mutable about a call: speaking state,
//! the playback buffer and its outstanding marks, the current reply's
//! cancellation token. It runs as one task and is driven by two channels:
//! commands from the media stream (transcripts, played marks, stop) and
//! results from the reply and synthesis tasks it spawns.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::aggregator::{AggregatorDecision, TranscriptAggregator};
use super::barge_in::{BargeInCoordinator, BargeInDecision};
use super::chunk::{ChunkKind, ResponseChunk, Utterance};
use super::config::CallSessionConfig;
use super::conversation::Conversation;
use super::dispatcher::SynthesisDispatcher;
use super::errors::{CallSessionError, CallSessionResult};
use super::events::SessionEvent;
use super::playback::PlaybackBuffer;
use super::sink::AudioSink;
use super::state::{SessionSnapshot, SpeakingState};
use super::streamer::ResponseStreamer;
use crate::core::llm::{BoxedLLM, ChatMessage};
use crate::core::stt::{STTError, TranscriptEvent};
use crate::core::tools::ToolRegistry;
use crate::core::tts::{BoxedTTS, SynthesisCache};

const COMMAND_BUFFER_SIZE: usize = 256;
const WORK_BUFFER_SIZE: usize = 256;

/// External services a session talks to
#[derive(Clone)]
pub struct SessionProviders {
    pub llm: BoxedLLM,
    pub tts: BoxedTTS,
    pub tools: Arc<ToolRegistry>,
    pub cache: SynthesisCache,
}

/// Handle used by the media stream to feed a running session.
#[derive(Clone)]
pub struct CallSessionHandle {
    commands: mpsc::Sender<SessionEvent>,
    snapshot: watch::Receiver<SessionSnapshot>,
    conversation: Conversation,
}

impl CallSessionHandle {
    async fn send(&self, event: SessionEvent) -> CallSessionResult<()> {
        self.commands
            .send(event)
            .await
            .map_err(|_| CallSessionError::Closed)
    }

    pub async fn push_transcript(&self, event: TranscriptEvent) -> CallSessionResult<()> {
        self.send(SessionEvent::Transcript(event)).await
    }

    pub async fn transcription_failed(&self, error: STTError) -> CallSessionResult<()> {
        self.send(SessionEvent::TranscriptionFailed(error)).await
    }

    /// The far end reported the segment tagged `label` as played.
    pub async fn mark_played(&self, label: impl Into<String>) -> CallSessionResult<()> {
        self.send(SessionEvent::MarkPlayed(label.into())).await
    }

    pub async fn stop(&self) -> CallSessionResult<()> {
        self.send(SessionEvent::Stop).await
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        *self.snapshot.borrow()
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.conversation.snapshot()
    }
}

struct ActiveReply {
    generation: u64,
    cancel: CancellationToken,
    /// Cleared once every chunk has been released
    deadline: Option<Instant>,
}

enum Wake {
    Event(SessionEvent),
    Deadline,
    Closed,
}

pub struct CallSession {
    stream_id: String,
    config: CallSessionConfig,
    aggregator: TranscriptAggregator,
    barge_in: BargeInCoordinator,
    streamer: ResponseStreamer,
    dispatcher: SynthesisDispatcher,
    buffer: PlaybackBuffer,
    conversation: Conversation,
    commands: mpsc::Receiver<SessionEvent>,
    work_tx: mpsc::Sender<SessionEvent>,
    work_rx: mpsc::Receiver<SessionEvent>,
    state: SpeakingState,
    generation: u64,
    reply: Option<ActiveReply>,
    snapshot: watch::Sender<SessionSnapshot>,
}

impl CallSession {
    /// Build the session for one call and start its task.
    pub fn spawn(
        stream_id: impl Into<String>,
        call_id: impl Into<String>,
        config: CallSessionConfig,
        providers: SessionProviders,
        sink: Arc<dyn AudioSink>,
    ) -> (CallSessionHandle, JoinHandle<CallSessionResult<()>>) {
        let stream_id = stream_id.into();
        let call_id = call_id.into();

        let mut initial = vec![ChatMessage::system(config.system_prompt.clone())];
        if let Some(greeting) = &config.greeting {
            initial.push(ChatMessage::assistant(greeting.clone()));
        }
        if !call_id.is_empty() {
            initial.push(ChatMessage::system(format!("callSid: {call_id}")));
        }
        let conversation = Conversation::new(initial);

        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let (work_tx, work_rx) = mpsc::channel(WORK_BUFFER_SIZE);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let session = CallSession {
            aggregator: TranscriptAggregator::new(config.aggregator.clone()),
            barge_in: BargeInCoordinator::new(config.barge_in.clone()),
            streamer: ResponseStreamer::new(
                providers.llm,
                providers.tools,
                conversation.clone(),
                &config,
            ),
            dispatcher: SynthesisDispatcher::new(
                providers.tts,
                providers.cache,
                config.synthesis_timeout,
            ),
            buffer: PlaybackBuffer::new(sink),
            conversation: conversation.clone(),
            stream_id,
            config,
            commands,
            work_tx,
            work_rx,
            state: SpeakingState::Listening,
            generation: 0,
            reply: None,
            snapshot: snapshot_tx,
        };

        let handle = CallSessionHandle {
            commands: commands_tx,
            snapshot: snapshot_rx,
            conversation,
        };
        (handle, tokio::spawn(session.run()))
    }

    async fn run(mut self) -> CallSessionResult<()> {
        info!(stream_id = %self.stream_id, "Call session started");
        let result = self.event_loop().await;
        if let Some(reply) = self.reply.take() {
            reply.cancel.cancel();
        }
        match &result {
            Ok(()) => info!(stream_id = %self.stream_id, "Call session ended"),
            Err(e) => error!(stream_id = %self.stream_id, "Call session failed: {}", e),
        }
        result
    }

    async fn event_loop(&mut self) -> CallSessionResult<()> {
        if let Some(greeting) = self.config.greeting.clone() {
            self.play_scripted(greeting)?;
            self.update_progress();
        }

        loop {
            let deadline = self.reply.as_ref().and_then(|reply| reply.deadline);
            let wake = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(event) => Wake::Event(event),
                    None => Wake::Closed,
                },
                Some(event) = self.work_rx.recv() => Wake::Event(event),
                _ = sleep_until(deadline) => Wake::Deadline,
            };

            match wake {
                Wake::Event(SessionEvent::Stop) | Wake::Closed => return Ok(()),
                Wake::Event(event) => self.handle_event(event).await?,
                Wake::Deadline => self.on_deadline(),
            }
            self.update_progress();
        }
    }

    async fn handle_event(&mut self, event: SessionEvent) -> CallSessionResult<()> {
        match event {
            SessionEvent::Transcript(event) => self.on_transcript(event).await?,
            SessionEvent::TranscriptionFailed(e) => {
                warn!(stream_id = %self.stream_id, "Transcription error: {}", e);
            }
            SessionEvent::MarkPlayed(label) => {
                if self.buffer.acknowledge(&label) {
                    debug!(stream_id = %self.stream_id, mark = %label, "Mark played");
                }
            }
            SessionEvent::Chunk { generation, chunk } => self.on_chunk(generation, chunk).await?,
            SessionEvent::Synthesized { generation, chunk } => {
                let index = chunk.index;
                if let Some(audio) = chunk.audio {
                    let sent = self.buffer.submit(generation, index, audio).await?;
                    if sent > 0 {
                        self.mark_playback_started(generation);
                    }
                } else {
                    self.buffer.skip(generation, index).await?;
                }
            }
            SessionEvent::SynthesisFailed {
                generation,
                index,
                error,
            } => {
                warn!(
                    stream_id = %self.stream_id,
                    generation, index, "Synthesis failed, skipping chunk: {}", error
                );
                let sent = self.buffer.skip(generation, index).await?;
                if sent > 0 {
                    self.mark_playback_started(generation);
                }
            }
            SessionEvent::ReplyCompleted { generation, total } => {
                self.buffer.seal(generation, total);
            }
            SessionEvent::ReplyFailed {
                generation,
                emitted,
                error,
            } => {
                error!(
                    stream_id = %self.stream_id,
                    generation,
                    "Model failed mid-reply: {}",
                    error
                );
                self.buffer.seal(generation, emitted);
            }
            SessionEvent::Stop => {}
        }
        Ok(())
    }

    async fn on_transcript(&mut self, event: TranscriptEvent) -> CallSessionResult<()> {
        match self.aggregator.observe(&event, &self.state) {
            AggregatorDecision::Ignore => Ok(()),
            AggregatorDecision::Respond(utterance) => {
                self.begin_reply(utterance);
                Ok(())
            }
            AggregatorDecision::PossibleBargeIn(utterance) => {
                match self.barge_in.evaluate(&utterance) {
                    BargeInDecision::Interrupt => self.interrupt(utterance).await,
                    BargeInDecision::SelfEcho | BargeInDecision::Trivial => Ok(()),
                }
            }
        }
    }

    async fn on_chunk(&mut self, generation: u64, chunk: ResponseChunk) -> CallSessionResult<()> {
        let Some(reply) = self.reply.as_ref().filter(|r| r.generation == generation) else {
            debug!(generation, index = chunk.index, "Dropping chunk from inactive reply");
            return Ok(());
        };
        if reply.cancel.is_cancelled() {
            return Ok(());
        }

        let index = chunk.index;
        let cancel = reply.cancel.child_token();
        if !self
            .dispatcher
            .dispatch(generation, chunk, cancel, self.work_tx.clone())
        {
            let sent = self.buffer.skip(generation, index).await?;
            if sent > 0 {
                self.mark_playback_started(generation);
            }
        }
        Ok(())
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        self.conversation.activate(generation);
        self.buffer.begin(generation);
        self.aggregator.reply_started();
        self.reply = Some(ActiveReply {
            generation,
            cancel: CancellationToken::new(),
            deadline: Some(Instant::now() + self.config.reply_deadline),
        });
        self.state = SpeakingState::Replying {
            generation,
            playback_started: false,
        };
        generation
    }

    fn begin_reply(&mut self, utterance: Utterance) {
        let generation = self.next_generation();
        info!(
            stream_id = %self.stream_id,
            generation,
            "Replying to: {}",
            utterance.text
        );
        if let Some(reply) = &self.reply {
            self.streamer.spawn(
                generation,
                utterance,
                reply.cancel.clone(),
                self.work_tx.clone(),
            );
        }
    }

    /// Speak fixed text as a reply of its own.
    fn play_scripted(&mut self, text: String) -> CallSessionResult<()> {
        let generation = self.next_generation();
        info!(stream_id = %self.stream_id, generation, "Playing scripted reply: {}", text);
        let chunk = ResponseChunk::new(0, text, ChunkKind::Scripted);
        let Some(reply) = &self.reply else {
            return Err(CallSessionError::Closed);
        };
        let dispatched = self.dispatcher.dispatch(
            generation,
            chunk,
            reply.cancel.child_token(),
            self.work_tx.clone(),
        );
        self.buffer.seal(generation, usize::from(dispatched));
        Ok(())
    }

    async fn interrupt(&mut self, utterance: Utterance) -> CallSessionResult<()> {
        info!(
            stream_id = %self.stream_id,
            generation = self.generation,
            "Caller barged in: {}",
            utterance.text
        );
        if let Some(reply) = self.reply.take() {
            reply.cancel.cancel();
        }
        self.buffer.flush().await?;
        self.begin_reply(utterance);
        Ok(())
    }

    fn on_deadline(&mut self) {
        let Some(reply) = self.reply.as_mut() else {
            return;
        };
        warn!(
            stream_id = %self.stream_id,
            generation = reply.generation,
            "Reply deadline exceeded after {} ms",
            self.config.reply_deadline.as_millis()
        );
        reply.cancel.cancel();
        reply.deadline = None;
        self.buffer.truncate(reply.generation);
    }

    fn mark_playback_started(&mut self, generation: u64) {
        if let SpeakingState::Replying {
            generation: current,
            playback_started,
        } = &mut self.state
            && *current == generation
            && !*playback_started
        {
            debug!(generation, "Playback started");
            *playback_started = true;
        }
    }

    /// Settle the reply after any event and publish the new snapshot.
    fn update_progress(&mut self) {
        if let Some(reply) = self.reply.as_mut()
            && self.buffer.is_fully_released()
        {
            reply.deadline = None;
        }
        if self.reply.is_some() && self.buffer.is_drained() {
            if let Some(reply) = self.reply.take() {
                info!(
                    stream_id = %self.stream_id,
                    generation = reply.generation,
                    "Reply finished, listening"
                );
                reply.cancel.cancel();
            }
            self.state = SpeakingState::Listening;
        }

        self.snapshot.send_if_modified(|snapshot| {
            let next = SessionSnapshot {
                state: self.state,
                generation: self.generation,
                outstanding_marks: self.buffer.outstanding_marks(),
            };
            let changed = *snapshot != next;
            *snapshot = next;
            changed
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
