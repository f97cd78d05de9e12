use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::CoreState;

/// Application state that can be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    /// Providers and per-call settings shared by every media stream
    pub core_state: Arc<CoreState>,
}

impl AppState {
    /// Build the shared providers described by `config`.
    ///
    /// Fails when a provider credential is missing.
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, String> {
        let core_state = CoreState::new(&config)?;
        Ok(Self::with_core_state(config, core_state))
    }

    /// Wrap an already constructed core state
    pub fn with_core_state(config: ServerConfig, core_state: Arc<CoreState>) -> Arc<Self> {
        Arc::new(Self { config, core_state })
    }
}
