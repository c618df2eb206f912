//! Translation engines: the seam between the gateway and pretrained models
//!
//! An engine knows how to turn a [`ModelSpec`] into a [`LoadedModel`]. The
//! gateway never tokenizes or generates itself; it only asks a loaded model
//! to translate a piece of text.

#[cfg(feature = "local")]
pub mod local;
pub mod remote;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::config::{EngineKind, Settings};
use crate::error::Result;
use crate::languages::{LanguagePair, ModelSpec};

pub use remote::RemoteEngine;

/// A model ready to translate for one language pair
#[async_trait]
pub trait LoadedModel: Send + Sync {
    /// Repository id of the underlying model
    fn model_id(&self) -> &str;

    /// Translate `text`, generating at most `max_length` tokens.
    /// Special tokens are stripped from the output.
    async fn translate(&self, text: &str, max_length: usize) -> Result<String>;
}

/// Engine status for the health endpoint
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EngineStatus {
    pub name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<String>,
}

/// Something that can load pretrained translation models
#[async_trait]
pub trait TranslationEngine: Send + Sync {
    /// Engine name, e.g. `remote`
    fn name(&self) -> &str;

    /// Load the model for `pair`. Called at most once per cached pair.
    async fn load(&self, pair: &LanguagePair, spec: &ModelSpec) -> Result<Arc<dyn LoadedModel>>;

    /// Actively check the engine's dependencies
    async fn health_check(&self) -> bool;

    /// Current status without probing
    fn status(&self) -> EngineStatus;
}

/// Create the engine selected by configuration
pub fn create_engine(settings: &Settings) -> Result<Arc<dyn TranslationEngine>> {
    match settings.translation.engine {
        EngineKind::Remote => {
            let engine = RemoteEngine::new(&settings.remote)?;
            info!(endpoints = settings.remote.endpoints.len(), "Using remote translation engine");
            Ok(Arc::new(engine))
        }
        #[cfg(feature = "local")]
        EngineKind::Local => {
            let engine = local::LocalEngine::new(&settings.local)?;
            info!(device = %settings.local.device, "Using local translation engine");
            Ok(Arc::new(engine))
        }
        #[cfg(not(feature = "local"))]
        EngineKind::Local => Err(crate::error::AppError::Config(config::ConfigError::Message(
            "The local engine requires building with the `local` feature".to_string(),
        ))),
    }
}
