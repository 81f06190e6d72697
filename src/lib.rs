// src/lib.rs
use std::sync::Arc;
use std::time::Duration;

pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod settings;

use config::ServerConfig;
use errors::EaselError;
use models::ProviderKind;
use services::{GeminiProvider, ImageProvider, ModelScopeProvider, ObjectStore};

/// Ceiling on any single upstream HTTP exchange (one generate call, one
/// status read, one result download). The poll loop's 45 s wall budget is
/// tracked separately by its clock.
const UPSTREAM_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub gemini: Arc<dyn ImageProvider>,
    pub modelscope: Arc<dyn ImageProvider>,
    pub store: Option<Arc<ObjectStore>>,
    pub gemini_fallback_key: Option<String>,
    pub modelscope_fallback_key: Option<String>,
}

impl AppState {
    pub fn from_config(config: &ServerConfig) -> Result<Self, EaselError> {
        let http = reqwest::Client::builder()
            .timeout(UPSTREAM_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EaselError::Internal(format!("cannot build HTTP client: {}", e)))?;

        // A broken store degrades sharing, never generation.
        let store = match &config.object_store_dir {
            Some(dir) => match ObjectStore::new(dir, config.public_base_url.clone()) {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    log::warn!("object storage disabled: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            gemini: Arc::new(GeminiProvider::new(
                http.clone(),
                config.gemini_base_url.clone(),
            )),
            modelscope: Arc::new(ModelScopeProvider::new(
                http,
                config.modelscope_base_url.clone(),
            )),
            store,
            gemini_fallback_key: config.gemini_api_key.clone(),
            modelscope_fallback_key: config.modelscope_api_key.clone(),
        })
    }

    pub fn provider(&self, kind: ProviderKind) -> Arc<dyn ImageProvider> {
        match kind {
            ProviderKind::Gemini => Arc::clone(&self.gemini),
            ProviderKind::ModelScope => Arc::clone(&self.modelscope),
        }
    }

    pub fn fallback_key(&self, kind: ProviderKind) -> Option<String> {
        match kind {
            ProviderKind::Gemini => self.gemini_fallback_key.clone(),
            ProviderKind::ModelScope => self.modelscope_fallback_key.clone(),
        }
    }
}
