//! Remote translation engine
//! Calls Hugging Face Inference compatible endpoints (`POST /models/{model_id}`)

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use super::{EngineStatus, LoadedModel, TranslationEngine};
use crate::config::RemoteEngineConfig;
use crate::error::{AppError, Result};
use crate::languages::{LanguagePair, ModelSpec};

/// Consecutive failures before an endpoint is taken out of rotation
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
    options: InferenceOptions,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_length: usize,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

#[derive(Debug, Deserialize)]
struct TranslationOutput {
    translation_text: String,
}

/// Endpoints answer with a list, some deployments with a bare object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Many(Vec<TranslationOutput>),
    One(TranslationOutput),
}

impl InferenceResponse {
    fn into_text(self) -> Option<String> {
        match self {
            InferenceResponse::Many(outputs) => {
                outputs.into_iter().next().map(|o| o.translation_text)
            }
            InferenceResponse::One(output) => Some(output.translation_text),
        }
    }
}

/// Inference endpoint status
#[derive(Debug, Clone)]
pub struct RemoteEndpoint {
    pub url: String,
    pub healthy: bool,
    pub last_check: Option<Instant>,
    pub consecutive_failures: u32,
}

impl RemoteEndpoint {
    pub fn new(url: String) -> Self {
        Self {
            url,
            healthy: true,
            last_check: None,
            consecutive_failures: 0,
        }
    }

    pub fn mark_healthy(&mut self) {
        self.healthy = true;
        self.last_check = Some(Instant::now());
        self.consecutive_failures = 0;
    }

    pub fn mark_unhealthy(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
            self.healthy = false;
        }
        self.last_check = Some(Instant::now());
    }
}

/// Shared HTTP plumbing used by the engine and every model it hands out
struct InferenceClient {
    client: Client,
    endpoints: RwLock<Vec<RemoteEndpoint>>,
    current_endpoint_index: RwLock<usize>,
    health_check_path: String,
    wait_for_model: bool,
    auth_token: Option<String>,
    auth_header_name: Option<String>,
}

impl InferenceClient {
    fn new(config: &RemoteEngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let endpoints = config
            .endpoints
            .iter()
            .map(|url| RemoteEndpoint::new(url.trim_end_matches('/').to_string()))
            .collect();

        // Get auth token from environment if specified
        let auth_token = config
            .auth
            .token_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .or_else(|| config.auth.api_key.clone());

        Ok(Self {
            client,
            endpoints: RwLock::new(endpoints),
            current_endpoint_index: RwLock::new(0),
            health_check_path: config.health_check_path.clone(),
            wait_for_model: config.wait_for_model,
            auth_token,
            auth_header_name: config.auth.header_name.clone(),
        })
    }

    /// Get headers with authentication
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.auth_token {
            match &self.auth_header_name {
                Some(header_name) => {
                    if let (Ok(name), Ok(value)) = (
                        HeaderName::from_bytes(header_name.as_bytes()),
                        HeaderValue::from_str(token),
                    ) {
                        headers.insert(name, value);
                    }
                }
                None => {
                    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                        headers.insert(AUTHORIZATION, value);
                    }
                }
            }
        }

        headers
    }

    /// Round-robin over healthy endpoints. When every endpoint is out of
    /// rotation all of them are tried again, since only a successful call
    /// brings one back.
    fn next_endpoint(&self) -> Option<String> {
        let endpoints = self.endpoints.read();
        let mut candidates: Vec<&RemoteEndpoint> = endpoints.iter().filter(|e| e.healthy).collect();
        if candidates.is_empty() {
            candidates = endpoints.iter().collect();
        }
        if candidates.is_empty() {
            return None;
        }

        let mut index = self.current_endpoint_index.write();
        *index = (*index + 1) % candidates.len();
        Some(candidates[*index].url.clone())
    }

    fn mark_endpoint_healthy(&self, url: &str) {
        let mut endpoints = self.endpoints.write();
        if let Some(endpoint) = endpoints.iter_mut().find(|e| e.url == url) {
            endpoint.mark_healthy();
            debug!(url = %url, "Marked endpoint as healthy");
        }
    }

    fn mark_endpoint_unhealthy(&self, url: &str) {
        let mut endpoints = self.endpoints.write();
        if let Some(endpoint) = endpoints.iter_mut().find(|e| e.url == url) {
            endpoint.mark_unhealthy();
            warn!(url = %url, failures = endpoint.consecutive_failures, "Endpoint call failed");
        }
    }

    async fn translate(&self, model_id: &str, text: &str, max_length: usize) -> Result<String> {
        let endpoint = self
            .next_endpoint()
            .ok_or_else(|| AppError::NoHealthyEndpoints(model_id.to_string()))?;

        let url = format!("{}/models/{}", endpoint, model_id);
        debug!(url = %url, chars = text.chars().count(), "Sending translation request");

        let request = InferenceRequest {
            inputs: text,
            parameters: InferenceParameters { max_length },
            options: InferenceOptions {
                wait_for_model: self.wait_for_model,
            },
        };

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                self.mark_endpoint_unhealthy(&endpoint);
                AppError::HttpClient(e)
            })?;

        let status = response.status();
        if status.is_success() {
            let body = response.json::<InferenceResponse>().await.map_err(|e| {
                error!(model = %model_id, error = %e, "Failed to parse translation response");
                AppError::BackendError(format!("Failed to parse response: {}", e))
            })?;

            self.mark_endpoint_healthy(&endpoint);
            body.into_text().ok_or_else(|| {
                AppError::Translation(format!("Model '{}' returned no translation", model_id))
            })
        } else {
            let body = response.text().await.unwrap_or_default();

            if status.is_server_error() {
                self.mark_endpoint_unhealthy(&endpoint);
            }

            Err(AppError::BackendError(format!(
                "Inference endpoint returned {}: {}",
                status,
                upstream_message(&body)
            )))
        }
    }

    async fn health_check(&self) -> bool {
        let endpoints = self.endpoints.read().clone();
        let mut any_healthy = false;

        for endpoint in &endpoints {
            let url = format!("{}{}", endpoint.url, self.health_check_path);
            let result = self.client.get(&url).headers(self.headers()).send().await;

            match result {
                // 401 means the server is up but wants different credentials
                Ok(response) if response.status().is_success() || response.status().as_u16() == 401 => {
                    self.mark_endpoint_healthy(&endpoint.url);
                    any_healthy = true;
                    debug!(endpoint = %endpoint.url, "Health check passed");
                }
                Ok(response) => {
                    self.mark_endpoint_unhealthy(&endpoint.url);
                    debug!(endpoint = %endpoint.url, status = %response.status(), "Health check failed");
                }
                Err(e) => {
                    self.mark_endpoint_unhealthy(&endpoint.url);
                    debug!(endpoint = %endpoint.url, error = %e, "Health check failed");
                }
            }
        }

        any_healthy
    }
}

/// Pull the `error` field out of an upstream error body, if there is one
fn upstream_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => match value.get("error") {
            Some(serde_json::Value::String(message)) => message.clone(),
            Some(serde_json::Value::Array(messages)) => messages
                .iter()
                .filter_map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join("; "),
            _ => body.to_string(),
        },
        Err(_) => body.to_string(),
    }
}

/// Engine backed by hosted inference endpoints
pub struct RemoteEngine {
    client: Arc<InferenceClient>,
}

impl RemoteEngine {
    pub fn new(config: &RemoteEngineConfig) -> Result<Self> {
        Ok(Self {
            client: Arc::new(InferenceClient::new(config)?),
        })
    }

    /// Snapshot of endpoint state
    pub fn endpoints(&self) -> Vec<RemoteEndpoint> {
        self.client.endpoints.read().clone()
    }
}

/// Handle for a model served remotely. Loading is just binding the id to the client.
pub struct RemoteModel {
    model_id: String,
    client: Arc<InferenceClient>,
}

#[async_trait]
impl LoadedModel for RemoteModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn translate(&self, text: &str, max_length: usize) -> Result<String> {
        self.client.translate(&self.model_id, text, max_length).await
    }
}

#[async_trait]
impl TranslationEngine for RemoteEngine {
    fn name(&self) -> &str {
        "remote"
    }

    async fn load(&self, pair: &LanguagePair, spec: &ModelSpec) -> Result<Arc<dyn LoadedModel>> {
        debug!(pair = %pair, model = %spec.model_id, "Binding remote model");
        Ok(Arc::new(RemoteModel {
            model_id: spec.model_id.clone(),
            client: self.client.clone(),
        }))
    }

    async fn health_check(&self) -> bool {
        self.client.health_check().await
    }

    fn status(&self) -> EngineStatus {
        let endpoints = self.client.endpoints.read();
        EngineStatus {
            name: self.name().to_string(),
            healthy: endpoints.iter().any(|e| e.healthy),
            endpoints: endpoints.iter().map(|e| e.url.clone()).collect(),
        }
    }
}
