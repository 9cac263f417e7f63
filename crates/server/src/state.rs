use std::sync::Arc;

use hlsproxy_core::{Config, OriginConfig, SanitizedConfig, TranscodeOrchestrator};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<TranscodeOrchestrator>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<TranscodeOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &TranscodeOrchestrator {
        self.orchestrator.as_ref()
    }

    /// Upstream origin for the HLS proxy route, if configured.
    pub fn origin(&self) -> Option<&OriginConfig> {
        self.config.origin.as_ref()
    }
}
