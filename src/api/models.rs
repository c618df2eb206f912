//! API request and response models

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::engine::EngineStatus;

/// Translation request
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct TranslateRequest {
    /// Text to translate; missing or empty yields an empty translation
    #[serde(default)]
    pub text: Option<String>,

    /// Source language code. Omitted defaults to `en`, `null` matches no pair.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub source_lang: Option<Option<String>>,

    /// Target language code. Omitted defaults to `fr`, `null` matches no pair.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub target_lang: Option<Option<String>>,
}

/// Tell an explicit `null` (`Some(None)`) apart from an omitted key (`None`)
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Translation result
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct TranslateResponse {
    pub translation: String,
}

/// Body of every error response
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Languages usable on each side of a pair
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct LanguagesResponse {
    pub source_languages: Vec<String>,
    pub target_languages: Vec<String>,
}

/// A configured language pair and the state of its model
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ModelEntry {
    pub pair: String,
    pub source: String,
    pub target: String,
    pub model: String,
    pub loaded: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ModelListResponse {
    pub engine: String,
    pub models: Vec<ModelEntry>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub engine: EngineStatus,
    pub loaded_models: usize,
}
