use std::sync::Arc;

use tracing::info;

use crate::config::ServerConfig;
use crate::core::call_session::{CallSessionConfig, SessionProviders};
use crate::core::llm::create_llm_provider;
use crate::core::stt::{BaseSTT, STTConfig, STTError, create_stt_provider};
use crate::core::tools::build_registry;
use crate::core::tts::{SynthesisCache, create_tts_provider};

/// Builds the recognizer for one call
pub type STTFactory =
    Arc<dyn Fn(STTConfig) -> Result<Box<dyn BaseSTT>, STTError> + Send + Sync>;

/// Core-specific shared state for the application.
///
/// Holds the providers every call shares (model, synthesizer, lookup
/// tools, synthesis cache) and what each call needs to build its own
/// recognizer connection.
#[derive(Clone)]
pub struct CoreState {
    pub providers: SessionProviders,
    pub session_config: CallSessionConfig,
    pub stt_config: STTConfig,
    stt_factory: STTFactory,
}

impl CoreState {
    /// Initialize core state from server configuration.
    ///
    /// Fails when a provider is missing its API key or a tool cannot be
    /// built.
    pub fn new(config: &ServerConfig) -> Result<Arc<Self>, String> {
        let llm = create_llm_provider(config.llm_config()?).map_err(|e| e.to_string())?;
        let tts_config = config.tts_config()?;
        let tts = create_tts_provider(&tts_config.provider.clone(), tts_config)
            .map_err(|e| e.to_string())?;
        let tools = build_registry(&config.tools).map_err(|e| e.to_string())?;
        info!(
            "Initialized providers: {} / {} with {} tool(s)",
            llm.get_provider_info(),
            tts.get_provider_info(),
            tools.len()
        );

        let stt_factory: STTFactory =
            Arc::new(|stt_config: STTConfig| create_stt_provider(&stt_config.provider.clone(), stt_config));

        Ok(Arc::new(Self {
            providers: SessionProviders {
                llm,
                tts,
                tools: Arc::new(tools),
                cache: SynthesisCache::default(),
            },
            session_config: config.session_config(),
            stt_config: config.stt_config()?,
            stt_factory,
        }))
    }

    /// Assemble state from ready-made parts.
    pub fn with_providers(
        providers: SessionProviders,
        session_config: CallSessionConfig,
        stt_config: STTConfig,
        stt_factory: STTFactory,
    ) -> Arc<Self> {
        Arc::new(Self {
            providers,
            session_config,
            stt_config,
            stt_factory,
        })
    }

    /// Create an unconnected recognizer for a new call
    pub fn create_stt(&self) -> Result<Box<dyn BaseSTT>, STTError> {
        (self.stt_factory)(self.stt_config.clone())
    }
}
