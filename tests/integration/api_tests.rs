//! API endpoint integration tests

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use opus_translate_gateway::api::routes::create_router;
use opus_translate_gateway::config::Settings;
use opus_translate_gateway::engine::{EngineStatus, LoadedModel, TranslationEngine};
use opus_translate_gateway::languages::{LanguagePair, ModelSpec};
use opus_translate_gateway::{AppError, AppState, Result};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Tags text with the pair it was translated for
struct TaggingModel {
    model_id: String,
    pair: LanguagePair,
}

#[async_trait]
impl LoadedModel for TaggingModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn translate(&self, text: &str, max_length: usize) -> Result<String> {
        match text {
            "boom" => return Err(AppError::Translation("generation diverged".to_string())),
            "slow" => tokio::time::sleep(Duration::from_millis(2500)).await,
            _ => {}
        }
        Ok(format!("[{}|{}] {}", self.pair, max_length, text))
    }
}

#[derive(Default)]
struct MockEngine {
    loads: AtomicUsize,
    broken: bool,
}

#[async_trait]
impl TranslationEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load(&self, pair: &LanguagePair, spec: &ModelSpec) -> Result<Arc<dyn LoadedModel>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(AppError::ModelLoad {
                model: spec.model_id.clone(),
                reason: "no weights".to_string(),
            });
        }
        Ok(Arc::new(TaggingModel {
            model_id: spec.model_id.clone(),
            pair: pair.clone(),
        }))
    }

    async fn health_check(&self) -> bool {
        !self.broken
    }

    fn status(&self) -> EngineStatus {
        EngineStatus {
            name: "mock".to_string(),
            healthy: !self.broken,
            endpoints: vec![],
        }
    }
}

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.rate_limit.enabled = false;
    settings
}

fn app_with(engine: Arc<MockEngine>, settings: Settings) -> Router {
    let state = AppState::new(settings, engine).unwrap();
    create_router(Arc::new(state))
}

fn app(engine: Arc<MockEngine>) -> Router {
    app_with(engine, test_settings())
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_translate_success() {
    let engine = Arc::new(MockEngine::default());
    let (status, body) = post_json(
        app(engine.clone()),
        "/translate",
        json!({"text": "Hello world", "source_lang": "en", "target_lang": "de"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"translation": "[en-de|512] Hello world"}));
    assert_eq!(engine.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_translate_uses_default_languages() {
    let engine = Arc::new(MockEngine::default());
    let (status, body) = post_json(app(engine), "/translate", json!({"text": "Good morning"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["translation"], "[en-fr|512] Good morning");
}

#[tokio::test]
async fn test_translate_reuses_cached_model() {
    let engine = Arc::new(MockEngine::default());
    let router = app(engine.clone());

    for text in ["one", "two", "three"] {
        let (status, _) = post_json(
            router.clone(),
            "/translate",
            json!({"text": text, "source_lang": "ru", "target_lang": "en"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(engine.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_text_short_circuits() {
    let engine = Arc::new(MockEngine::default());
    let router = app(engine.clone());

    let (status, body) = post_json(
        router.clone(),
        "/translate",
        json!({"text": "", "source_lang": "xx", "target_lang": "yy"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"translation": ""}));

    let (status, body) = post_json(router, "/translate", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"translation": ""}));

    assert_eq!(engine.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unsupported_pair() {
    let engine = Arc::new(MockEngine::default());
    let (status, body) = post_json(
        app(engine.clone()),
        "/translate",
        json!({"text": "Hallo", "source_lang": "de", "target_lang": "fr"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Language pair not supported"}));
    assert_eq!(engine.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_same_language_is_unsupported() {
    let engine = Arc::new(MockEngine::default());
    let (status, body) = post_json(
        app(engine),
        "/translate",
        json!({"text": "Hello", "source_lang": "en", "target_lang": "en"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Language pair not supported");
}

#[tokio::test]
async fn test_null_language_is_unsupported() {
    let engine = Arc::new(MockEngine::default());
    let router = app(engine.clone());

    let (status, body) = post_json(
        router.clone(),
        "/translate",
        json!({"text": "hi", "source_lang": null}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Language pair not supported"}));

    let (status, _) = post_json(
        router,
        "/translate",
        json!({"text": "hi", "source_lang": "en", "target_lang": null}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(engine.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_model_load_failure_is_500() {
    let engine = Arc::new(MockEngine {
        broken: true,
        ..Default::default()
    });
    let router = app(engine.clone());

    let (status, body) = post_json(router.clone(), "/translate", json!({"text": "Hello"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("no weights"));

    // Failed loads are not cached
    let (status, _) = post_json(router, "/translate", json!({"text": "Hello"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(engine.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_generation_failure_is_500() {
    let engine = Arc::new(MockEngine::default());
    let (status, body) = post_json(app(engine), "/translate", json!({"text": "boom"})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Translation failed: generation diverged");
}

#[tokio::test]
async fn test_request_timeout_has_error_body() {
    let mut settings = test_settings();
    settings.server.request_timeout_secs = 1;
    let engine = Arc::new(MockEngine::default());

    let (status, body) = post_json(app_with(engine, settings), "/translate", json!({"text": "slow"})).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body, json!({"error": "Request timed out after 1s"}));
}

#[tokio::test]
async fn test_text_too_long() {
    let mut settings = test_settings();
    settings.translation.max_input_chars = 10;
    let engine = Arc::new(MockEngine::default());

    let (status, body) = post_json(
        app_with(engine, settings),
        "/translate",
        json!({"text": "this is more than ten characters"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("too long"));
}

#[tokio::test]
async fn test_malformed_body() {
    let engine = Arc::new(MockEngine::default());
    let request = Request::builder()
        .method("POST")
        .uri("/translate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(app(engine), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_languages() {
    let engine = Arc::new(MockEngine::default());
    let (status, body) = get_json(app(engine), "/languages").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "source_languages": ["de", "en", "es", "fr", "ru"],
            "target_languages": ["de", "en", "es", "fr", "ru"],
        })
    );
}

#[tokio::test]
async fn test_models_report_loaded_state() {
    let engine = Arc::new(MockEngine::default());
    let router = app(engine);

    let (_, body) = get_json(router.clone(), "/models").await;
    assert_eq!(body["engine"], "mock");
    let models = body["models"].as_array().unwrap();
    assert_eq!(models.len(), 8);
    assert!(models.iter().all(|m| m["loaded"] == false));

    post_json(router.clone(), "/translate", json!({"text": "Hi", "target_lang": "es"})).await;

    let (_, body) = get_json(router, "/models").await;
    let en_es = body["models"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["pair"] == "en-es")
        .unwrap();
    assert_eq!(en_es["model"], "Helsinki-NLP/opus-mt-en-es");
    assert_eq!(en_es["loaded"], true);
}

#[tokio::test]
async fn test_health() {
    let engine = Arc::new(MockEngine::default());
    let (status, body) = get_json(app(engine), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["engine"]["name"], "mock");
    assert_eq!(body["loaded_models"], 0);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_index_page_lists_languages() {
    let engine = Arc::new(MockEngine::default());
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();

    let response = app(engine).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("<option value=\"ru\">Russian</option>"));
    assert!(html.contains("/static/js/app.js"));
}

#[tokio::test]
async fn test_static_assets_are_served() {
    let mut settings = test_settings();
    settings.server.static_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/static").to_string();
    let router = app_with(Arc::new(MockEngine::default()), settings);

    let request = Request::builder()
        .uri("/static/js/app.js")
        .body(Body::empty())
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let script = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(script.contains("/translate"));

    let request = Request::builder()
        .uri("/static/js/missing.js")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limit() {
    let mut settings = Settings::default();
    settings.rate_limit.enabled = true;
    settings.rate_limit.requests_per_second = 1;
    settings.rate_limit.burst_size = 1;
    let router = app_with(Arc::new(MockEngine::default()), settings);

    let (status, _) = get_json(router.clone(), "/languages").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get_json(router.clone(), "/languages").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "Rate limit exceeded");

    // Health is exempt
    let (status, _) = get_json(router, "/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_openapi_document() {
    let engine = Arc::new(MockEngine::default());
    let (status, body) = get_json(app(engine), "/api-docs/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/translate"]["post"].is_object());
}
