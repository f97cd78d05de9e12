//! Shared helpers for CallSession scenario tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::stubs::{RecordingSink, ScriptedLLM, StubTTS};
use crate::core::call_session::{
    CallSession, CallSessionConfig, CallSessionHandle, CallSessionResult, SessionProviders,
    SpeakingState,
};
use crate::core::stt::TranscriptEvent;
use crate::core::tools::{ToolProvider, ToolRegistry};
use crate::core::tts::{BaseTTS, SynthesisCache, TTSConfig};

pub const WAIT: Duration = Duration::from_secs(2);

/// Session config without a greeting so scenarios start in Listening.
pub fn quiet_config() -> CallSessionConfig {
    CallSessionConfig {
        greeting: None,
        ..Default::default()
    }
}

pub fn stub_tts() -> StubTTS {
    StubTTS::new(TTSConfig::default()).expect("stub tts")
}

pub struct Harness {
    pub handle: CallSessionHandle,
    pub task: JoinHandle<CallSessionResult<()>>,
    pub sink: Arc<RecordingSink>,
    pub llm: Arc<ScriptedLLM>,
}

pub fn start(
    config: CallSessionConfig,
    llm: Arc<ScriptedLLM>,
    tts: StubTTS,
    tools: Vec<Arc<dyn ToolProvider>>,
) -> Harness {
    start_with_sink(config, llm, tts, tools, Arc::new(RecordingSink::default()))
}

pub fn start_with_sink(
    config: CallSessionConfig,
    llm: Arc<ScriptedLLM>,
    tts: StubTTS,
    tools: Vec<Arc<dyn ToolProvider>>,
    sink: Arc<RecordingSink>,
) -> Harness {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool);
    }
    let tts: Arc<dyn BaseTTS> = Arc::new(tts);
    let providers = SessionProviders {
        llm: llm.clone(),
        tts,
        tools: Arc::new(registry),
        cache: SynthesisCache::default(),
    };
    let (handle, task) = CallSession::spawn("MZ-test", "CA-test", config, providers, sink.clone());
    Harness {
        handle,
        task,
        sink,
        llm,
    }
}

/// Final transcript attributed to `speakers`, one tag per word.
pub fn caller_final(text: &str, speaker: u32) -> TranscriptEvent {
    let speakers = vec![speaker; text.split_whitespace().count()];
    TranscriptEvent::new(text, true, true, 0.95).with_speakers(speakers)
}

/// Poll `check` until it holds or the wait runs out.
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let result = tokio::time::timeout(WAIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {what}");
}

pub async fn wait_for_audio(harness: &Harness, count: usize) {
    let sink = harness.sink.clone();
    eventually(&format!("{count} audio segments"), move || {
        sink.audio_texts().len() >= count
    })
    .await;
}

/// Wait until reply `generation` (or a later one) has finished.
pub async fn wait_for_listening(harness: &Harness, generation: u64) {
    let mut snapshots = harness.handle.subscribe();
    let result = tokio::time::timeout(
        WAIT,
        snapshots.wait_for(|snapshot| {
            snapshot.generation >= generation && snapshot.state == SpeakingState::Listening
        }),
    )
    .await;
    assert!(
        matches!(result, Ok(Ok(_))),
        "session did not return to listening after reply {generation}"
    );
}

pub async fn wait_for_playback(harness: &Harness) {
    let mut snapshots = harness.handle.subscribe();
    let result = tokio::time::timeout(
        WAIT,
        snapshots.wait_for(|snapshot| snapshot.state.is_speaking()),
    )
    .await;
    assert!(matches!(result, Ok(Ok(_))), "playback never started");
}

/// Acknowledge every mark sent so far, in order.
pub async fn acknowledge_all(harness: &Harness) {
    for mark in harness.sink.marks() {
        harness
            .handle
            .mark_played(mark)
            .await
            .expect("session accepts marks");
    }
}
