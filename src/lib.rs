//! OPUS-MT Translate Gateway
//!
//! Serves machine translation over HTTP. Each language pair maps to a
//! pretrained Marian model; models are loaded on first use and cached for
//! the life of the process.

pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod languages;
pub mod middleware;

pub use error::{AppError, Result};

use std::sync::Arc;

use cache::ModelCache;
use engine::TranslationEngine;
use languages::LanguageCatalog;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<config::Settings>,
    pub cache: Arc<ModelCache>,
}

impl AppState {
    /// Build state around an already constructed engine
    pub fn new(settings: config::Settings, engine: Arc<dyn TranslationEngine>) -> Result<Self> {
        let catalog = Arc::new(LanguageCatalog::from_config(&settings.language_pairs)?);
        Ok(Self {
            settings: Arc::new(settings),
            cache: Arc::new(ModelCache::new(engine, catalog)),
        })
    }

    /// Build state with the engine selected by configuration
    pub fn from_settings(settings: config::Settings) -> Result<Self> {
        let engine = engine::create_engine(&settings)?;
        Self::new(settings, engine)
    }
}
