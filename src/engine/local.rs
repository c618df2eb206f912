//! In-process Marian engine built on candle
//!
//! Weights, config and tokenizers are fetched from the Hugging Face Hub and
//! cached on disk by `hf-hub`. Generation is greedy and stops at EOS or after
//! `max_length` tokens.

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::marian::{self, MTModel};
use hf_hub::api::sync::{Api, ApiBuilder};
use hf_hub::{Repo, RepoType};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::{EngineStatus, LoadedModel, TranslationEngine};
use crate::config::LocalEngineConfig;
use crate::error::{AppError, Result};
use crate::languages::{LanguagePair, ModelSpec};

const DEFAULT_WEIGHTS: &str = "model.safetensors";

/// Engine running Marian models on this machine
pub struct LocalEngine {
    device: Device,
    cache_dir: Option<PathBuf>,
}

impl LocalEngine {
    pub fn new(config: &LocalEngineConfig) -> Result<Self> {
        let device = match config.device.as_str() {
            "cpu" => Device::Cpu,
            "cuda" => Device::cuda_if_available(0).map_err(|e| {
                AppError::Internal(format!("Failed to initialize CUDA device: {}", e))
            })?,
            other => {
                return Err(AppError::Config(config::ConfigError::Message(format!(
                    "Unknown device '{}', expected 'cpu' or 'cuda'",
                    other
                ))))
            }
        };

        Ok(Self {
            device,
            cache_dir: config.cache_dir.as_ref().map(PathBuf::from),
        })
    }

    fn hub(&self) -> Result<Api> {
        let mut builder = ApiBuilder::new().with_progress(false);
        if let Some(dir) = &self.cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }
        builder
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to initialize Hugging Face Hub API: {}", e)))
    }
}

#[async_trait]
impl TranslationEngine for LocalEngine {
    fn name(&self) -> &str {
        "local"
    }

    async fn load(&self, pair: &LanguagePair, spec: &ModelSpec) -> Result<Arc<dyn LoadedModel>> {
        let hub = self.hub()?;
        let device = self.device.clone();
        let spec = spec.clone();
        let model_id = spec.model_id.clone();

        info!(pair = %pair, model = %model_id, "Loading Marian model");
        let started = Instant::now();

        let model = tokio::task::spawn_blocking(move || MarianModel::load(&hub, &spec, device))
            .await
            .map_err(|e| AppError::Internal(format!("Model loading task failed: {}", e)))??;

        info!(
            pair = %pair,
            model = %model_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Marian model loaded"
        );

        Ok(Arc::new(LocalModel {
            inner: Arc::new(model),
        }))
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn status(&self) -> EngineStatus {
        EngineStatus {
            name: self.name().to_string(),
            healthy: true,
            endpoints: vec![],
        }
    }
}

struct MarianModel {
    model_id: String,
    device: Device,
    config: marian::Config,
    source_tokenizer: Tokenizer,
    target_tokenizer: Tokenizer,
    // The decoder keeps a KV cache, so one generation at a time per model
    model: Mutex<MTModel>,
}

impl MarianModel {
    fn load(hub: &Api, spec: &ModelSpec, device: Device) -> Result<Self> {
        let load_err = |reason: String| AppError::ModelLoad {
            model: spec.model_id.clone(),
            reason,
        };

        let repo = match &spec.revision {
            Some(revision) => hub.repo(Repo::with_revision(
                spec.model_id.clone(),
                RepoType::Model,
                revision.clone(),
            )),
            None => hub.model(spec.model_id.clone()),
        };

        let config_path = repo
            .get("config.json")
            .map_err(|e| load_err(format!("config.json: {}", e)))?;
        let config: marian::Config = serde_json::from_slice(&std::fs::read(&config_path)?)
            .map_err(|e| load_err(format!("invalid config.json: {}", e)))?;

        let weights_file = spec.weights.as_deref().unwrap_or(DEFAULT_WEIGHTS);
        let weights = repo
            .get(weights_file)
            .map_err(|e| load_err(format!("{}: {}", weights_file, e)))?;

        let vb = if weights_file.ends_with(".safetensors") {
            // SAFETY: the file is owned by the hub cache and not modified while mapped
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device) }
        } else {
            VarBuilder::from_pth(&weights, DType::F32, &device)
        }
        .map_err(|e| load_err(format!("weights: {}", e)))?;

        let model = MTModel::new(&config, vb).map_err(|e| load_err(format!("model: {}", e)))?;

        let tokenizer_repo = match &spec.tokenizer_repo {
            Some(id) => hub.model(id.clone()),
            None => repo,
        };
        let fetch_tokenizer = |file: &str| -> Result<Tokenizer> {
            let path = tokenizer_repo
                .get(file)
                .map_err(|e| load_err(format!("{}: {}", file, e)))?;
            Tokenizer::from_file(&path).map_err(|e| load_err(format!("{}: {}", file, e)))
        };

        // OPUS-MT repos ship SentencePiece models only, converted files are configured per pair
        let source_tokenizer = fetch_tokenizer(
            spec.source_tokenizer
                .as_deref()
                .ok_or_else(|| load_err("no source_tokenizer configured".to_string()))?,
        )?;
        let target_tokenizer = fetch_tokenizer(
            spec.target_tokenizer
                .as_deref()
                .ok_or_else(|| load_err("no target_tokenizer configured".to_string()))?,
        )?;

        Ok(Self {
            model_id: spec.model_id.clone(),
            device,
            config,
            source_tokenizer,
            target_tokenizer,
            model: Mutex::new(model),
        })
    }

    fn generate(&self, text: &str, max_length: usize) -> Result<String> {
        let candle_err = |e: candle_core::Error| AppError::Translation(e.to_string());

        let mut tokens = self
            .source_tokenizer
            .encode(text, true)
            .map_err(|e| AppError::Translation(format!("Tokenization failed: {}", e)))?
            .get_ids()
            .to_vec();
        tokens.push(self.config.eos_token_id);

        let mut model = self.model.lock();
        model.reset_kv_cache();

        let input = Tensor::new(tokens.as_slice(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(candle_err)?;
        let encoder_xs = model.encoder().forward(&input, 0).map_err(candle_err)?;

        let mut token_ids = vec![self.config.decoder_start_token_id];
        for index in 0..max_length {
            let context_size = if index >= 1 { 1 } else { token_ids.len() };
            let start_pos = token_ids.len().saturating_sub(context_size);

            let input_ids = Tensor::new(&token_ids[start_pos..], &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(candle_err)?;
            let logits = model
                .decode(&input_ids, &encoder_xs, start_pos)
                .and_then(|l| l.squeeze(0))
                .map_err(candle_err)?;
            let last = logits
                .dim(0)
                .and_then(|len| logits.get(len - 1))
                .and_then(|l| l.to_dtype(DType::F32))
                .and_then(|l| l.to_vec1::<f32>())
                .map_err(candle_err)?;

            let next = pick_token(&last, self.config.pad_token_id, self.config.eos_token_id);
            token_ids.push(next);
            if is_end(next, &self.config) {
                break;
            }
        }

        let generated = output_tokens(&token_ids[1..], &self.config);

        self.target_tokenizer
            .decode(&generated, true)
            .map_err(|e| AppError::Translation(format!("Decoding failed: {}", e)))
    }
}

/// Greedy choice, never the padding token. Empty scores end the sequence.
fn pick_token(scores: &[f32], pad: u32, eos: u32) -> u32 {
    scores
        .iter()
        .enumerate()
        .filter(|(id, _)| *id != pad as usize)
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(id, _)| id as u32)
        .unwrap_or(eos)
}

fn is_end(token: u32, config: &marian::Config) -> bool {
    token == config.eos_token_id || token == config.forced_eos_token_id
}

/// Generated ids without EOS and padding
fn output_tokens(generated: &[u32], config: &marian::Config) -> Vec<u32> {
    generated
        .iter()
        .copied()
        .filter(|&id| id != config.eos_token_id && id != config.pad_token_id)
        .collect()
}

struct LocalModel {
    inner: Arc<MarianModel>,
}

#[async_trait]
impl LoadedModel for LocalModel {
    fn model_id(&self) -> &str {
        &self.inner.model_id
    }

    async fn translate(&self, text: &str, max_length: usize) -> Result<String> {
        let model = self.inner.clone();
        let text = text.to_string();
        let started = Instant::now();

        let output = tokio::task::spawn_blocking(move || model.generate(&text, max_length))
            .await
            .map_err(|e| AppError::Internal(format!("Generation task failed: {}", e)))??;

        debug!(
            model = %self.inner.model_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation finished"
        );
        Ok(output)
    }
}
