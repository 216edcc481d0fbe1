use sentinel_core::{Orchestrator, SentinelConfig};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(config: &SentinelConfig) -> anyhow::Result<Self> {
        let orchestrator = Orchestrator::from_config(config)
            .map_err(|e| anyhow::anyhow!("Failed to initialize scan pipeline: {}", e))?;

        if config.oracle.api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY is not set, scans will fail until it is configured");
        }
        if config.repository.token.is_none() {
            tracing::info!("GITHUB_TOKEN is not set, using unauthenticated repository access");
        }

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
        })
    }
}
