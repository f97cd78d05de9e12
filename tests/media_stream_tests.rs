//! End-to-end media stream calls against a locally bound server

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use voxbridge::core::call_session::{CallSessionConfig, SessionProviders};
use voxbridge::core::llm::{BaseLLM, ChatMessage, LLMEvent, LLMResult, LLMStream, ToolDefinition};
use voxbridge::core::state::STTFactory;
use voxbridge::core::stt::{
    BaseSTT, STTConfig, STTError, STTErrorCallback, STTResultCallback, TranscriptEvent,
};
use voxbridge::core::tools::ToolRegistry;
use voxbridge::core::tts::{AudioData, BaseTTS, SynthesisCache, TTSConfig, TTSResult};
use voxbridge::{CoreState, ServerConfig, routes, state::AppState};

const WAIT: Duration = Duration::from_secs(3);

/// Treats every inbound frame as UTF-8 text and reports it as a finished utterance
struct EchoSTT {
    config: STTConfig,
    on_result: Option<STTResultCallback>,
    connected: bool,
}

#[async_trait]
impl BaseSTT for EchoSTT {
    fn new(config: STTConfig) -> Result<Self, STTError> {
        Ok(Self {
            config,
            on_result: None,
            connected: false,
        })
    }

    async fn connect(&mut self) -> Result<(), STTError> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), STTError> {
        self.connected = false;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected
    }

    async fn send_audio(&mut self, audio_data: Vec<u8>) -> Result<(), STTError> {
        if let Some(callback) = &self.on_result {
            let text = String::from_utf8_lossy(&audio_data).to_string();
            callback(TranscriptEvent::new(text, true, true, 0.95)).await;
        }
        Ok(())
    }

    async fn on_result(&mut self, callback: STTResultCallback) -> Result<(), STTError> {
        self.on_result = Some(callback);
        Ok(())
    }

    async fn on_error(&mut self, _callback: STTErrorCallback) -> Result<(), STTError> {
        Ok(())
    }

    fn get_config(&self) -> Option<&STTConfig> {
        Some(&self.config)
    }

    fn get_provider_info(&self) -> &'static str {
        "echo"
    }
}

/// Recognizer whose connection is already gone; counts attempted sends
struct LostSTT {
    config: STTConfig,
    sends: Arc<AtomicUsize>,
}

#[async_trait]
impl BaseSTT for LostSTT {
    fn new(config: STTConfig) -> Result<Self, STTError> {
        Ok(Self {
            config,
            sends: Arc::new(AtomicUsize::new(0)),
        })
    }

    async fn connect(&mut self) -> Result<(), STTError> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), STTError> {
        Ok(())
    }

    fn is_ready(&self) -> bool {
        false
    }

    async fn send_audio(&mut self, _audio_data: Vec<u8>) -> Result<(), STTError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        Err(STTError::NetworkError("connection closed".to_string()))
    }

    async fn on_result(&mut self, _callback: STTResultCallback) -> Result<(), STTError> {
        Ok(())
    }

    async fn on_error(&mut self, _callback: STTErrorCallback) -> Result<(), STTError> {
        Ok(())
    }

    fn get_config(&self) -> Option<&STTConfig> {
        Some(&self.config)
    }

    fn get_provider_info(&self) -> &'static str {
        "lost"
    }
}

/// Answers every turn with the same two segments
struct CannedLLM;

#[async_trait]
impl BaseLLM for CannedLLM {
    async fn stream_chat(&self, _: &[ChatMessage], _: &[ToolDefinition]) -> LLMResult<LLMStream> {
        let (tx, rx) = mpsc::channel(8);
        for event in [
            LLMEvent::Content("We open at nine. • ".to_string()),
            LLMEvent::Content("Anything else?".to_string()),
            LLMEvent::Done,
        ] {
            let _ = tx.send(Ok(event)).await;
        }
        Ok(rx)
    }

    fn get_provider_info(&self) -> &'static str {
        "canned"
    }
}

/// Audio is the text itself, so payloads can be read back in assertions
struct TextTTS {
    config: TTSConfig,
}

#[async_trait]
impl BaseTTS for TextTTS {
    fn new(config: TTSConfig) -> TTSResult<Self> {
        Ok(Self { config })
    }

    async fn synthesize(&self, text: &str) -> TTSResult<AudioData> {
        Ok(AudioData::mulaw(text.as_bytes().to_vec()))
    }

    fn get_config(&self) -> &TTSConfig {
        &self.config
    }

    fn get_provider_info(&self) -> &'static str {
        "text"
    }
}

fn echo_factory() -> STTFactory {
    Arc::new(|config| Ok(Box::new(<EchoSTT as BaseSTT>::new(config)?) as Box<dyn BaseSTT>))
}

async fn start_server() -> String {
    start_server_with(echo_factory()).await
}

async fn start_server_with(factory: STTFactory) -> String {
    let providers = SessionProviders {
        llm: Arc::new(CannedLLM),
        tts: Arc::new(<TextTTS as BaseTTS>::new(TTSConfig::default()).unwrap()),
        tools: Arc::new(ToolRegistry::new()),
        cache: SynthesisCache::default(),
    };
    let session_config = CallSessionConfig {
        greeting: Some("Hello caller.".to_string()),
        ..Default::default()
    };
    let core_state =
        CoreState::with_providers(providers, session_config, STTConfig::default(), factory);
    let app_state = AppState::with_core_state(ServerConfig::default(), core_state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, routes::create_router(app_state))
            .await
            .unwrap();
    });
    format!("ws://{address}/call/connection")
}

type Client = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn send(client: &mut Client, frame: Value) {
    client
        .send(Message::Text(frame.to_string().into()))
        .await
        .unwrap();
}

/// Next JSON frame from the server, or `None` once the socket closes
async fn next_frame(client: &mut Client) -> Option<Value> {
    loop {
        let message = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for a frame")?;
        match message {
            Ok(Message::Text(text)) => return Some(serde_json::from_str(text.as_str()).unwrap()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

/// Read a media frame and its mark; returns the decoded text and the mark label
async fn next_segment(client: &mut Client) -> (String, String) {
    let media = next_frame(client).await.expect("media frame");
    assert_eq!(media["event"], "media");
    assert_eq!(media["streamSid"], "MZ-e2e");
    let audio = STANDARD
        .decode(media["media"]["payload"].as_str().unwrap())
        .unwrap();

    let mark = next_frame(client).await.expect("mark frame");
    assert_eq!(mark["event"], "mark");
    (
        String::from_utf8(audio).unwrap(),
        mark["mark"]["name"].as_str().unwrap().to_string(),
    )
}

async fn ack(client: &mut Client, label: &str) {
    send(
        client,
        json!({"event": "mark", "streamSid": "MZ-e2e", "sequenceNumber": "9", "mark": {"name": label}}),
    )
    .await;
}

async fn start_call(url: &str) -> Client {
    let (mut client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    send(
        &mut client,
        json!({"event": "connected", "protocol": "Call", "version": "1.0.0"}),
    )
    .await;
    send(
        &mut client,
        json!({
            "event": "start",
            "sequenceNumber": "1",
            "streamSid": "MZ-e2e",
            "start": {
                "streamSid": "MZ-e2e",
                "accountSid": "AC-e2e",
                "callSid": "CA-e2e",
                "tracks": ["inbound"],
                "customParameters": {},
                "mediaFormat": {"encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1}
            }
        }),
    )
    .await;
    client
}

fn media_frame(text: &str) -> Value {
    json!({
        "event": "media",
        "sequenceNumber": "2",
        "streamSid": "MZ-e2e",
        "media": {"track": "inbound", "chunk": "1", "timestamp": "20", "payload": STANDARD.encode(text)}
    })
}

#[tokio::test]
async fn test_call_greets_then_answers_in_order() {
    let url = start_server().await;
    let mut client = start_call(&url).await;

    let (greeting, mark) = next_segment(&mut client).await;
    assert_eq!(greeting, "Hello caller.");
    ack(&mut client, &mark).await;

    send(&mut client, media_frame("what time do you open")).await;

    let (first, first_mark) = next_segment(&mut client).await;
    let (second, second_mark) = next_segment(&mut client).await;
    assert_eq!(first, "We open at nine.");
    assert_eq!(second, "Anything else?");
    assert_ne!(first_mark, second_mark);

    ack(&mut client, &first_mark).await;
    ack(&mut client, &second_mark).await;

    send(
        &mut client,
        json!({"event": "stop", "sequenceNumber": "10", "streamSid": "MZ-e2e", "stop": {"callSid": "CA-e2e"}}),
    )
    .await;
    assert!(next_frame(&mut client).await.is_none());
}

#[tokio::test]
async fn test_caller_barge_in_clears_playback() {
    let url = start_server().await;
    let mut client = start_call(&url).await;

    // Leave the greeting unacknowledged so it is still playing
    let (greeting, _) = next_segment(&mut client).await;
    assert_eq!(greeting, "Hello caller.");

    send(&mut client, media_frame("sorry to cut in")).await;

    let clear = next_frame(&mut client).await.expect("clear frame");
    assert_eq!(clear, json!({"event": "clear", "streamSid": "MZ-e2e"}));

    let (first, _) = next_segment(&mut client).await;
    assert_eq!(first, "We open at nine.");
}

#[tokio::test]
async fn test_malformed_frames_do_not_end_the_call() {
    let url = start_server().await;
    let mut client = start_call(&url).await;

    client
        .send(Message::Text("not json".to_string().into()))
        .await
        .unwrap();
    send(&mut client, json!({"event": "dtmf", "streamSid": "MZ-e2e", "dtmf": {"digit": "5"}})).await;

    let (greeting, _) = next_segment(&mut client).await;
    assert_eq!(greeting, "Hello caller.");
}

#[tokio::test]
async fn test_lost_recognizer_is_dropped_after_first_failure() {
    let sends = Arc::new(AtomicUsize::new(0));
    let counter = sends.clone();
    let factory: STTFactory = Arc::new(move |config| {
        Ok(Box::new(LostSTT {
            config,
            sends: counter.clone(),
        }) as Box<dyn BaseSTT>)
    });
    let url = start_server_with(factory).await;
    let mut client = start_call(&url).await;

    let (greeting, mark) = next_segment(&mut client).await;
    assert_eq!(greeting, "Hello caller.");

    for _ in 0..5 {
        send(&mut client, media_frame("is anyone there")).await;
    }
    ack(&mut client, &mark).await;

    // The call keeps running: a stop still closes the socket cleanly
    send(
        &mut client,
        json!({"event": "stop", "sequenceNumber": "10", "streamSid": "MZ-e2e", "stop": {"callSid": "CA-e2e"}}),
    )
    .await;
    assert!(next_frame(&mut client).await.is_none());
    assert_eq!(sends.load(Ordering::SeqCst), 1);
}
