//! Per-connection call state
//!
//! One media socket carries at most one call. The call exists from the
//! `start` frame until the socket closes, and owns the session task and
//! the recognizer connection feeding it.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::error::{MediaStreamError, MediaStreamResult};
use super::messages::StartMetadata;
use super::sink::MediaStreamSink;
use crate::core::CoreState;
use crate::core::call_session::{CallSession, CallSessionHandle, CallSessionResult};
use crate::core::stt::{BaseSTT, STTErrorCallback, STTResultCallback};

/// How long a stopping session gets to wind down before it is abandoned
const SESSION_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ActiveCall {
    pub stream_sid: String,
    pub handle: CallSessionHandle,
    /// Taken once the task has been joined
    pub session: Option<JoinHandle<CallSessionResult<()>>>,
    /// Absent when the recognizer could not be reached
    pub stt: Option<Box<dyn BaseSTT>>,
}

impl ActiveCall {
    /// Start the session for a newly announced stream and connect its recognizer.
    ///
    /// A recognizer failure is logged and the call proceeds without
    /// transcripts.
    pub async fn start(
        start: StartMetadata,
        writer: mpsc::Sender<Message>,
        core_state: &CoreState,
    ) -> Self {
        let stream_sid = start.stream_sid;
        let call_sid = start.call_sid.unwrap_or_default();
        info!(stream_id = %stream_sid, call_sid = %call_sid, "Media stream started");

        let sink = Arc::new(MediaStreamSink::new(stream_sid.clone(), writer));
        let (handle, session) = CallSession::spawn(
            stream_sid.clone(),
            call_sid,
            core_state.session_config.clone(),
            core_state.providers.clone(),
            sink,
        );

        let stt = match connect_stt(core_state, &handle).await {
            Ok(stt) => Some(stt),
            Err(e) => {
                error!(stream_id = %stream_sid, "Speech recognition unavailable: {}", e);
                None
            }
        };

        Self {
            stream_sid,
            handle,
            session: Some(session),
            stt,
        }
    }

    /// Decode one inbound frame and pass it to the recognizer.
    ///
    /// The first failed send drops the recognizer; the call continues
    /// without transcripts.
    pub async fn forward_audio(&mut self, payload: &str) -> MediaStreamResult<()> {
        let Some(stt) = self.stt.as_mut() else {
            return Ok(());
        };
        let audio = STANDARD
            .decode(payload)
            .map_err(|e| MediaStreamError::InvalidPayload(e.to_string()))?;
        if let Err(e) = stt.send_audio(audio).await {
            warn!(
                stream_id = %self.stream_sid,
                "Speech recognition lost, continuing without transcripts: {}", e
            );
            if let Some(mut stt) = self.stt.take() {
                let _ = stt.disconnect().await;
            }
        }
        Ok(())
    }

    /// Stop the session, wait for it briefly, then drop the recognizer
    pub async fn shutdown(mut self) {
        if let Some(mut session) = self.session.take() {
            if self.handle.stop().await.is_err() {
                debug!(stream_id = %self.stream_sid, "Session already stopped");
            }
            match tokio::time::timeout(SESSION_SHUTDOWN_TIMEOUT, &mut session).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!(stream_id = %self.stream_sid, "Session task failed: {}", e),
                Err(_) => {
                    warn!(stream_id = %self.stream_sid, "Session did not stop in time");
                    session.abort();
                }
            }
        }

        if let Some(mut stt) = self.stt.take()
            && let Err(e) = stt.disconnect().await
        {
            warn!(stream_id = %self.stream_sid, "Failed to disconnect STT: {}", e);
        }
        info!(stream_id = %self.stream_sid, "Media stream closed");
    }
}

/// Build the recognizer and route its events into the session
async fn connect_stt(
    core_state: &CoreState,
    handle: &CallSessionHandle,
) -> MediaStreamResult<Box<dyn BaseSTT>> {
    let mut stt = core_state.create_stt()?;

    let results = handle.clone();
    let on_result: STTResultCallback = Arc::new(move |event| {
        let handle = results.clone();
        Box::pin(async move {
            if handle.push_transcript(event).await.is_err() {
                debug!("Session closed, dropping transcript");
            }
        })
    });
    stt.on_result(on_result).await?;

    let failures = handle.clone();
    let on_error: STTErrorCallback = Arc::new(move |error| {
        let handle = failures.clone();
        Box::pin(async move {
            if handle.transcription_failed(error).await.is_err() {
                debug!("Session closed, dropping transcription error");
            }
        })
    });
    stt.on_error(on_error).await?;

    stt.connect().await?;
    Ok(stt)
}
