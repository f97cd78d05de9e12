//! Outbound audio over the media WebSocket

use async_trait::async_trait;
use axum::extract::ws::Message;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::sync::mpsc;

use super::messages::{MarkPayload, MediaPayload, OutgoingMessage};
use crate::core::call_session::{AudioSink, SinkError};
use crate::core::tts::AudioData;

/// Writes `media`, `mark` and `clear` frames onto the socket writer channel.
pub struct MediaStreamSink {
    stream_sid: String,
    sender: mpsc::Sender<Message>,
}

impl MediaStreamSink {
    pub fn new(stream_sid: impl Into<String>, sender: mpsc::Sender<Message>) -> Self {
        Self {
            stream_sid: stream_sid.into(),
            sender,
        }
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), SinkError> {
        let json = serde_json::to_string(&message).map_err(|e| SinkError::Encoding(e.to_string()))?;
        self.sender
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| SinkError::Closed)
    }
}

#[async_trait]
impl AudioSink for MediaStreamSink {
    async fn send_audio(&self, audio: &AudioData, mark: &str) -> Result<(), SinkError> {
        self.send(OutgoingMessage::Media {
            stream_sid: self.stream_sid.clone(),
            media: MediaPayload::outbound(STANDARD.encode(&audio.data)),
        })
        .await?;
        self.send(OutgoingMessage::Mark {
            stream_sid: self.stream_sid.clone(),
            mark: MarkPayload {
                name: mark.to_string(),
            },
        })
        .await
    }

    async fn clear(&self) -> Result<(), SinkError> {
        self.send(OutgoingMessage::Clear {
            stream_sid: self.stream_sid.clone(),
        })
        .await
    }
}
