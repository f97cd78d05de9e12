use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{RwLock, broadcast, mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{HeaderValue, header::AUTHORIZATION},
        protocol::Message,
    },
};
use tracing::{debug, error, info, warn};
use url::Url;

use super::base::{
    BaseSTT, STTConfig, STTConnectionState, STTError, STTErrorCallback, STTResultCallback,
    TranscriptEvent,
};

pub const DEEPGRAM_STT_URL: &str = "wss://api.deepgram.com/v1/listen";

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(3);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Deepgram streaming message. Only the fields the bridge consumes are modelled.
#[derive(Debug, Deserialize)]
pub struct DeepgramResponse {
    #[serde(rename = "type")]
    pub response_type: String,
    pub channel: Option<DeepgramChannel>,
    pub is_final: Option<bool>,
    pub speech_final: Option<bool>,
    pub description: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FrameKind {
    #[serde(rename = "type")]
    response_type: String,
}

#[derive(Debug, Deserialize)]
pub struct DeepgramChannel {
    pub alternatives: Vec<DeepgramAlternative>,
}

#[derive(Debug, Deserialize)]
pub struct DeepgramAlternative {
    pub transcript: String,
    pub confidence: f32,
    #[serde(default)]
    pub words: Vec<DeepgramWord>,
}

#[derive(Debug, Deserialize)]
pub struct DeepgramWord {
    pub word: String,
    pub speaker: Option<u32>,
}

/// Translate one Deepgram text frame into a transcript event.
///
/// `UtteranceEnd` frames map to [`TranscriptEvent::utterance_end`]. Returns
/// `Ok(None)` for other frames without a transcript, such as metadata and
/// speech-started notifications.
pub fn parse_message(text: &str) -> Result<Option<TranscriptEvent>, STTError> {
    // `channel` is an object on results but an index array on other frames
    let kind: FrameKind = serde_json::from_str(text)
        .map_err(|e| STTError::ProviderError(format!("Failed to parse response: {e}")))?;
    match kind.response_type.as_str() {
        "Results" | "Error" => {}
        "UtteranceEnd" => return Ok(Some(TranscriptEvent::utterance_end())),
        other => {
            debug!("Ignoring Deepgram message type: {}", other);
            return Ok(None);
        }
    }

    let response: DeepgramResponse = serde_json::from_str(text)
        .map_err(|e| STTError::ProviderError(format!("Failed to parse response: {e}")))?;

    match response.response_type.as_str() {
        "Results" => {
            let Some(alternative) = response
                .channel
                .and_then(|channel| channel.alternatives.into_iter().next())
            else {
                return Ok(None);
            };
            let speakers = alternative
                .words
                .iter()
                .filter_map(|word| word.speaker)
                .collect();
            Ok(Some(
                TranscriptEvent::new(
                    alternative.transcript,
                    response.is_final.unwrap_or(false),
                    response.speech_final.unwrap_or(false),
                    alternative.confidence,
                )
                .with_speakers(speakers),
            ))
        }
        "Error" => Err(STTError::ProviderError(
            response
                .description
                .or(response.message)
                .unwrap_or_else(|| "Unknown error from Deepgram".to_string()),
        )),
        _ => Ok(None),
    }
}

/// Deepgram STT WebSocket client
pub struct DeepgramSTT {
    config: STTConfig,
    state: Arc<RwLock<STTConnectionState>>,
    ws_sender: Option<mpsc::UnboundedSender<Message>>,
    shutdown_tx: Option<broadcast::Sender<()>>,
    result_callback: Option<STTResultCallback>,
    error_callback: Option<STTErrorCallback>,
    connection_handle: Option<tokio::task::JoinHandle<()>>,
}

impl DeepgramSTT {
    /// Build the WebSocket URL with query parameters
    pub fn build_websocket_url(config: &STTConfig) -> Result<Url, STTError> {
        let base = config.base_url.as_deref().unwrap_or(DEEPGRAM_STT_URL);
        let mut url = Url::parse(base)
            .map_err(|e| STTError::ConfigurationError(format!("Invalid WebSocket URL: {e}")))?;

        {
            let mut query_pairs = url.query_pairs_mut();
            query_pairs.append_pair("model", &config.model);
            query_pairs.append_pair("language", &config.language);
            query_pairs.append_pair("encoding", &config.encoding);
            query_pairs.append_pair("sample_rate", &config.sample_rate.to_string());
            query_pairs.append_pair("channels", &config.channels.to_string());
            query_pairs.append_pair("punctuate", &config.punctuation.to_string());
            query_pairs.append_pair("diarize", &config.diarize.to_string());
            query_pairs.append_pair("interim_results", "true");
            query_pairs.append_pair("smart_format", "true");
            if let Some(endpointing) = config.endpointing_ms {
                query_pairs.append_pair("endpointing", &endpointing.to_string());
            }
            if let Some(utterance_end) = config.utterance_end_ms {
                query_pairs.append_pair("utterance_end_ms", &utterance_end.to_string());
                query_pairs.append_pair("vad_events", "true");
            }
        }

        Ok(url)
    }

    async fn dispatch_frame(
        text: &str,
        result_callback: &Option<STTResultCallback>,
        error_callback: &Option<STTErrorCallback>,
    ) {
        match parse_message(text) {
            Ok(Some(event)) => {
                if let Some(callback) = result_callback {
                    callback(event).await;
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!("Deepgram reported an error: {}", e);
                if let Some(callback) = error_callback {
                    callback(e).await;
                }
            }
        }
    }

    /// Tell the owner the connection is gone so it stops sending audio
    async fn report_lost(error_callback: &Option<STTErrorCallback>, reason: String) {
        if let Some(callback) = error_callback {
            callback(STTError::ConnectionFailed(format!("Deepgram connection {reason}"))).await;
        }
    }

    async fn start_connection(&mut self) -> Result<(), STTError> {
        let ws_url = Self::build_websocket_url(&self.config)?;
        let mut request = ws_url
            .as_str()
            .into_client_request()
            .map_err(|e| STTError::ConfigurationError(format!("Invalid request: {e}")))?;
        let auth = HeaderValue::from_str(&format!("token {}", self.config.api_key))
            .map_err(|e| STTError::AuthenticationFailed(format!("Invalid API key: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let (ws_tx, mut ws_rx) = mpsc::unbounded_channel::<Message>();
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), STTError>>();

        self.ws_sender = Some(ws_tx);
        self.shutdown_tx = Some(shutdown_tx);

        let state = self.state.clone();
        let result_callback = self.result_callback.clone();
        let error_callback = self.error_callback.clone();

        let connection_handle = tokio::spawn(async move {
            *state.write().await = STTConnectionState::Connecting;

            let ws_stream = match connect_async(request).await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    error!("Failed to connect to Deepgram: {}", e);
                    *state.write().await = STTConnectionState::Error(e.to_string());
                    let _ = ready_tx.send(Err(STTError::ConnectionFailed(e.to_string())));
                    return;
                }
            };

            info!("Connected to Deepgram WebSocket");
            *state.write().await = STTConnectionState::Connected;
            let _ = ready_tx.send(Ok(()));

            let (mut ws_sink, mut ws_stream) = ws_stream.split();
            let mut keep_alive = tokio::time::interval(KEEP_ALIVE_INTERVAL);
            keep_alive.tick().await;

            loop {
                tokio::select! {
                    Some(message) = ws_rx.recv() => {
                        if let Err(e) = ws_sink.send(message).await {
                            error!("Failed to send WebSocket message: {}", e);
                            Self::report_lost(&error_callback, format!("send failed: {e}")).await;
                            break;
                        }
                    }
                    _ = keep_alive.tick() => {
                        let ping = Message::Text(r#"{"type":"KeepAlive"}"#.into());
                        if let Err(e) = ws_sink.send(ping).await {
                            warn!("Failed to send keep-alive: {}", e);
                            break;
                        }
                    }
                    message = ws_stream.next() => {
                        match message {
                            Some(Ok(Message::Text(text))) => {
                                Self::dispatch_frame(&text, &result_callback, &error_callback).await;
                            }
                            Some(Ok(Message::Close(frame))) => {
                                info!("Deepgram closed the connection: {:?}", frame);
                                Self::report_lost(&error_callback, "closed by Deepgram".to_string()).await;
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!("WebSocket error: {}", e);
                                if let Some(callback) = &error_callback {
                                    callback(STTError::NetworkError(e.to_string())).await;
                                }
                                break;
                            }
                            None => {
                                info!("WebSocket stream ended");
                                Self::report_lost(&error_callback, "stream ended".to_string()).await;
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = ws_sink
                            .send(Message::Text(r#"{"type":"CloseStream"}"#.into()))
                            .await;
                        break;
                    }
                }
            }

            *state.write().await = STTConnectionState::Disconnected;
            info!("Deepgram WebSocket connection closed");
        });

        self.connection_handle = Some(connection_handle);

        match timeout(CONNECT_TIMEOUT, ready_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(STTError::ConnectionFailed(
                "Connection task exited before it was ready".to_string(),
            )),
            Err(_) => Err(STTError::ConnectionFailed("Connection timeout".to_string())),
        }
    }
}

#[async_trait::async_trait]
impl BaseSTT for DeepgramSTT {
    fn new(config: STTConfig) -> Result<Self, STTError> {
        if config.api_key.is_empty() {
            return Err(STTError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        Ok(Self {
            config,
            state: Arc::new(RwLock::new(STTConnectionState::Disconnected)),
            ws_sender: None,
            shutdown_tx: None,
            result_callback: None,
            error_callback: None,
            connection_handle: None,
        })
    }

    async fn connect(&mut self) -> Result<(), STTError> {
        self.start_connection().await?;
        info!("Successfully connected to Deepgram STT");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), STTError> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(handle) = self.connection_handle.take() {
            let _ = timeout(Duration::from_secs(5), handle).await;
        }
        self.ws_sender = None;
        *self.state.write().await = STTConnectionState::Disconnected;

        info!("Disconnected from Deepgram STT");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ws_sender.is_some()
    }

    async fn send_audio(&mut self, audio_data: Vec<u8>) -> Result<(), STTError> {
        let Some(ws_sender) = &self.ws_sender else {
            return Err(STTError::ConnectionFailed(
                "Not connected to Deepgram".to_string(),
            ));
        };

        let len = audio_data.len();
        ws_sender
            .send(Message::Binary(audio_data.into()))
            .map_err(|e| STTError::NetworkError(format!("Failed to send audio data: {e}")))?;
        debug!("Sent {} bytes of audio data", len);
        Ok(())
    }

    async fn on_result(&mut self, callback: STTResultCallback) -> Result<(), STTError> {
        self.result_callback = Some(callback);
        Ok(())
    }

    async fn on_error(&mut self, callback: STTErrorCallback) -> Result<(), STTError> {
        self.error_callback = Some(callback);
        Ok(())
    }

    fn get_config(&self) -> Option<&STTConfig> {
        Some(&self.config)
    }

    fn get_provider_info(&self) -> &'static str {
        "Deepgram STT WebSocket v1"
    }
}

impl Drop for DeepgramSTT {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(());
        }
    }
}
