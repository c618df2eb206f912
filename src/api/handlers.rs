//! HTTP request handlers

use crate::api::models::{
    ErrorResponse, HealthResponse, LanguagesResponse, ModelEntry, ModelListResponse,
    TranslateRequest, TranslateResponse,
};
use crate::api::page;
use crate::error::AppError;
use crate::languages::LanguagePair;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Html,
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Render the translator page
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(page::render(&state.cache.catalog().languages()))
}

/// Translate a text between two languages
#[utoipa::path(
    post,
    path = "/translate",
    tag = "Translation",
    request_body = TranslateRequest,
    responses(
        (status = 200, description = "Translated text", body = TranslateResponse),
        (status = 400, description = "Unsupported language pair or invalid request", body = ErrorResponse),
        (status = 500, description = "Model loading or generation failed", body = ErrorResponse),
        (status = 504, description = "Request exceeded the server timeout", body = ErrorResponse),
    )
)]
pub async fn translate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> Result<Json<TranslateResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let translation = &state.settings.translation;

    let text = request.text.unwrap_or_default();
    if text.is_empty() {
        return Ok(Json(TranslateResponse {
            translation: String::new(),
        }));
    }

    let source = request
        .source_lang
        .unwrap_or_else(|| Some(translation.default_source.clone()));
    let target = request
        .target_lang
        .unwrap_or_else(|| Some(translation.default_target.clone()));

    // An explicit null language matches no pair
    let pair = match (source, target) {
        (Some(source), Some(target)) => LanguagePair::new(source, target),
        (source, target) => {
            return Err(AppError::UnsupportedLanguagePair(format!(
                "{}-{}",
                source.as_deref().unwrap_or("null"),
                target.as_deref().unwrap_or("null")
            )))
        }
    };

    if !state.cache.catalog().contains(&pair) {
        return Err(AppError::UnsupportedLanguagePair(pair.to_string()));
    }

    let chars = text.chars().count();
    if chars > translation.max_input_chars {
        return Err(AppError::InvalidRequest(format!(
            "Text is too long: {} characters, at most {} allowed",
            chars, translation.max_input_chars
        )));
    }

    info!(pair = %pair, chars, "Received translation request");
    let started = Instant::now();

    let model = state.cache.get_or_load(&pair).await?;
    let output = model.translate(&text, translation.max_length).await?;

    info!(
        pair = %pair,
        model = %model.model_id(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Translation completed"
    );

    Ok(Json(TranslateResponse {
        translation: output,
    }))
}

/// List the languages available on each side
#[utoipa::path(
    get,
    path = "/languages",
    tag = "Translation",
    responses(
        (status = 200, description = "Available languages", body = LanguagesResponse),
    )
)]
pub async fn languages(State(state): State<Arc<AppState>>) -> Json<LanguagesResponse> {
    let catalog = state.cache.catalog();
    Json(LanguagesResponse {
        source_languages: catalog.source_languages(),
        target_languages: catalog.target_languages(),
    })
}

/// List configured language pairs and whether their models are loaded
#[utoipa::path(
    get,
    path = "/models",
    tag = "Models",
    responses(
        (status = 200, description = "Configured models", body = ModelListResponse),
    )
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelListResponse> {
    let models = state
        .cache
        .catalog()
        .pairs()
        .map(|(pair, spec)| ModelEntry {
            pair: pair.to_string(),
            source: pair.source.clone(),
            target: pair.target.clone(),
            model: spec.model_id.clone(),
            loaded: state.cache.is_loaded(pair),
        })
        .collect();

    Json(ModelListResponse {
        engine: state.cache.engine().name().to_string(),
        models,
    })
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service status", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let engine = state.cache.engine().status();

    Json(HealthResponse {
        status: if engine.healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine,
        loaded_models: state.cache.len(),
    })
}
