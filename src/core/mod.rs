pub mod call_session;
pub mod llm;
pub mod state;
pub mod stt;
pub mod tools;
pub mod tts;

// Re-export commonly used types for convenience
pub use stt::{
    BaseSTT, DeepgramSTT, STTConfig, STTConnectionState, STTError, STTProvider, TranscriptEvent,
    create_stt_provider,
};

pub use tts::{
    AudioData, BaseTTS, BoxedTTS, DeepgramTTS, SynthesisCache, TTSConfig, TTSError, TTSResult,
    create_tts_provider,
};

pub use llm::{BaseLLM, BoxedLLM, ChatMessage, LLMConfig, LLMError, LLMEvent, create_llm_provider};

pub use tools::{HttpLookupTool, HttpToolConfig, ToolProvider, ToolRegistry};

pub use call_session::{
    CallSession, CallSessionConfig, CallSessionError, CallSessionHandle, SessionProviders,
};

pub use state::CoreState;
