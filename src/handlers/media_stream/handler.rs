//! Axum WebSocket handler for telephony media streams

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use super::{
    error::{MediaStreamError, MediaStreamResult},
    messages::IncomingMessage,
    state::ActiveCall,
};
use crate::core::call_session::CallSessionResult;
use crate::state::AppState;

/// Outbound frames waiting for the socket writer
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Upgrades the HTTP connection to a media-stream WebSocket
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("Media stream connection upgrade requested");
    ws.on_upgrade(move |socket| handle_media_socket(socket, state))
}

async fn handle_media_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("Media stream connection established");

    let (mut sender, mut receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<Message>(CHANNEL_BUFFER_SIZE);

    let sender_task = tokio::spawn(async move {
        while let Some(message) = message_rx.recv().await {
            if let Err(e) = sender.send(message).await {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let mut call: Option<ActiveCall> = None;

    loop {
        select! {
            msg_result = receiver.next() => {
                match msg_result {
                    Some(Ok(msg)) => match process_message(msg, &mut call, &message_tx, &app_state).await {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => warn!("Media stream error: {}", e),
                    },
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!("Media stream connection closed by client");
                        break;
                    }
                }
            }
            result = session_finished(&mut call) => {
                if let Some(active) = call.as_mut() {
                    active.session = None;
                }
                match result {
                    Ok(Ok(())) => info!("Call session finished"),
                    Ok(Err(e)) => error!("Call session ended with error, closing stream: {}", e),
                    Err(e) => error!("Call session task failed: {}", e),
                }
                break;
            }
        }
    }

    if let Some(active) = call.take() {
        active.shutdown().await;
    }
    sender_task.abort();

    info!("Media stream connection terminated");
}

/// Resolves when the running session task ends; pending while there is none
async fn session_finished(
    call: &mut Option<ActiveCall>,
) -> Result<CallSessionResult<()>, JoinError> {
    match call.as_mut().and_then(|active| active.session.as_mut()) {
        Some(session) => session.await,
        None => std::future::pending().await,
    }
}

/// Process one WebSocket frame.
///
/// Returns `Ok(false)` when the connection should close.
async fn process_message(
    msg: Message,
    call: &mut Option<ActiveCall>,
    message_tx: &mpsc::Sender<Message>,
    app_state: &Arc<AppState>,
) -> MediaStreamResult<bool> {
    match msg {
        Message::Text(text) => {
            let incoming: IncomingMessage = serde_json::from_str(&text)
                .map_err(|e| MediaStreamError::InvalidMessage(e.to_string()))?;
            handle_incoming_message(incoming, call, message_tx, app_state).await
        }
        Message::Binary(data) => {
            debug!("Ignoring binary frame: {} bytes", data.len());
            Ok(true)
        }
        Message::Ping(_) | Message::Pong(_) => Ok(true),
        Message::Close(_) => {
            info!("Media stream connection closed by client");
            Ok(false)
        }
    }
}

async fn handle_incoming_message(
    msg: IncomingMessage,
    call: &mut Option<ActiveCall>,
    message_tx: &mpsc::Sender<Message>,
    app_state: &Arc<AppState>,
) -> MediaStreamResult<bool> {
    match msg {
        IncomingMessage::Connected { protocol, version } => {
            debug!(
                "Media stream connected: protocol={:?} version={:?}",
                protocol, version
            );
            Ok(true)
        }
        IncomingMessage::Start { start, .. } => {
            if call.is_some() {
                return Err(MediaStreamError::AlreadyStarted);
            }
            *call = Some(ActiveCall::start(start, message_tx.clone(), &app_state.core_state).await);
            Ok(true)
        }
        IncomingMessage::Media { media, .. } => {
            if !media.is_inbound() {
                return Ok(true);
            }
            let active = call.as_mut().ok_or(MediaStreamError::NotStarted)?;
            active.forward_audio(&media.payload).await?;
            Ok(true)
        }
        IncomingMessage::Mark { mark, .. } => {
            let active = call.as_ref().ok_or(MediaStreamError::NotStarted)?;
            active.handle.mark_played(mark.name).await?;
            Ok(true)
        }
        IncomingMessage::Stop { stream_sid, .. } => {
            info!("Media stream stopped: {:?}", stream_sid);
            Ok(false)
        }
        IncomingMessage::Unknown => {
            debug!("Ignoring unsupported media stream event");
            Ok(true)
        }
    }
}
