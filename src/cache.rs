//! Model cache keyed by language pair
//!
//! Lookup-or-load with single flight: concurrent first requests for a pair
//! await one shared load and all see its outcome. A failed load leaves the
//! slot empty so the next request retries.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::engine::{LoadedModel, TranslationEngine};
use crate::error::{AppError, Result};
use crate::languages::{LanguageCatalog, LanguagePair, ModelSpec};

type LoadOutcome = std::result::Result<Arc<dyn LoadedModel>, Arc<AppError>>;
type PendingLoad = Shared<BoxFuture<'static, LoadOutcome>>;

enum Slot {
    Loading(PendingLoad),
    Ready(Arc<dyn LoadedModel>),
}

impl Slot {
    fn is_ready(&self) -> bool {
        matches!(self, Slot::Ready(_))
    }

    fn is_pending(&self, load: &PendingLoad) -> bool {
        matches!(self, Slot::Loading(current) if current.ptr_eq(load))
    }
}

/// Loaded models, one per language pair
pub struct ModelCache {
    engine: Arc<dyn TranslationEngine>,
    catalog: Arc<LanguageCatalog>,
    slots: DashMap<LanguagePair, Slot>,
}

impl ModelCache {
    pub fn new(engine: Arc<dyn TranslationEngine>, catalog: Arc<LanguageCatalog>) -> Self {
        Self {
            engine,
            catalog,
            slots: DashMap::new(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn TranslationEngine> {
        &self.engine
    }

    pub fn catalog(&self) -> &Arc<LanguageCatalog> {
        &self.catalog
    }

    /// Return the cached model for `pair`, loading it on first use
    pub async fn get_or_load(&self, pair: &LanguagePair) -> Result<Arc<dyn LoadedModel>> {
        let spec = self
            .catalog
            .model_for(pair)
            .ok_or_else(|| AppError::UnsupportedLanguagePair(pair.to_string()))?;

        // The entry guard must be released before awaiting
        let load = match self.slots.entry(pair.clone()) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::Ready(model) => return Ok(model.clone()),
                Slot::Loading(load) => load.clone(),
            },
            Entry::Vacant(entry) => {
                let load = self.start_load(pair.clone(), spec.clone());
                entry.insert(Slot::Loading(load.clone()));
                load
            }
        };

        // Await a clone: a completed `Shared` no longer compares equal
        match load.clone().await {
            Ok(model) => {
                if let Some(mut slot) = self.slots.get_mut(pair) {
                    if slot.is_pending(&load) {
                        *slot = Slot::Ready(model.clone());
                    }
                }
                Ok(model)
            }
            Err(err) => {
                self.slots.remove_if(pair, |_, slot| slot.is_pending(&load));
                Err(err.replicate())
            }
        }
    }

    fn start_load(&self, pair: LanguagePair, spec: ModelSpec) -> PendingLoad {
        let engine = self.engine.clone();
        async move {
            let started = Instant::now();
            match engine.load(&pair, &spec).await {
                Ok(model) => {
                    info!(
                        pair = %pair,
                        model = %spec.model_id,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Model cached"
                    );
                    Ok(model)
                }
                Err(err) => {
                    warn!(pair = %pair, model = %spec.model_id, error = %err, "Model load failed");
                    Err(Arc::new(err))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Whether a model for `pair` has finished loading
    pub fn is_loaded(&self, pair: &LanguagePair) -> bool {
        self.slots
            .get(pair)
            .map_or(false, |slot| slot.value().is_ready())
    }

    /// Pairs with a loaded model, sorted
    pub fn loaded_pairs(&self) -> Vec<LanguagePair> {
        let mut pairs: Vec<LanguagePair> = self
            .slots
            .iter()
            .filter(|entry| entry.value().is_ready())
            .map(|entry| entry.key().clone())
            .collect();
        pairs.sort();
        pairs
    }

    /// Number of loaded models
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.value().is_ready())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load every pair up front. Failures are logged and left for lazy retry.
    pub async fn preload(&self, pairs: &[LanguagePair]) -> usize {
        let mut loaded = 0;
        for pair in pairs {
            match self.get_or_load(pair).await {
                Ok(_) => loaded += 1,
                Err(e) => warn!(pair = %pair, error = %e, "Failed to preload model"),
            }
        }
        loaded
    }

    /// Drop the cached model for `pair`. In-flight requests keep their handle.
    /// A load still in progress is left alone and `false` is returned.
    pub fn unload(&self, pair: &LanguagePair) -> bool {
        let removed = self
            .slots
            .remove_if(pair, |_, slot| slot.is_ready())
            .is_some();
        if removed {
            info!(pair = %pair, "Model evicted");
        }
        removed
    }
}
