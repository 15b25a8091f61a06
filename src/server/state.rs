//! Application state shared across handlers

use crate::config::{AppConfig, ConfigStore};
use crate::gemini::GeminiClient;
use crate::imagegen::ImageGenClient;
use crate::registry::ModelRegistry;

/// Shared state: the config store, the model slot, and the outbound clients.
pub struct AppState {
    pub config: ConfigStore,
    pub registry: ModelRegistry,
    pub gemini: GeminiClient,
    pub imagegen: ImageGenClient,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: ConfigStore::new(config),
            registry: ModelRegistry::new(),
            gemini: GeminiClient::from_env(),
            imagegen: ImageGenClient::from_env(),
        }
    }
}
