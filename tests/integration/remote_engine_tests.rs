//! Remote engine tests against a mocked inference endpoint

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use opus_translate_gateway::api::routes::create_router;
use opus_translate_gateway::config::{EngineAuth, RemoteEngineConfig, Settings};
use opus_translate_gateway::engine::{LoadedModel, RemoteEngine, TranslationEngine};
use opus_translate_gateway::languages::{LanguagePair, ModelSpec};
use opus_translate_gateway::{AppError, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn remote_config(server: &MockServer) -> RemoteEngineConfig {
    RemoteEngineConfig {
        endpoints: vec![server.uri()],
        auth: EngineAuth {
            token_env: None,
            header_name: None,
            api_key: Some("test-token".to_string()),
        },
        timeout_ms: 5000,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_translate_via_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/Helsinki-NLP/opus-mt-en-fr"))
        .and(header_matcher("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "inputs": "Hello",
            "parameters": {"max_length": 512},
            "options": {"wait_for_model": true},
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"translation_text": "Bonjour"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let engine = RemoteEngine::new(&remote_config(&server)).unwrap();
    let model = engine
        .load(
            &LanguagePair::new("en", "fr"),
            &ModelSpec::new("Helsinki-NLP/opus-mt-en-fr"),
        )
        .await
        .unwrap();

    assert_eq!(model.model_id(), "Helsinki-NLP/opus-mt-en-fr");
    assert_eq!(model.translate("Hello", 512).await.unwrap(), "Bonjour");
}

#[tokio::test]
async fn test_custom_auth_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/Helsinki-NLP/opus-mt-de-en"))
        .and(header_matcher("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"translation_text": "Hello"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = remote_config(&server);
    config.auth = EngineAuth {
        token_env: None,
        header_name: Some("x-api-key".to_string()),
        api_key: Some("secret".to_string()),
    };

    let engine = RemoteEngine::new(&config).unwrap();
    let model = engine
        .load(
            &LanguagePair::new("de", "en"),
            &ModelSpec::new("Helsinki-NLP/opus-mt-de-en"),
        )
        .await
        .unwrap();

    assert_eq!(model.translate("Hallo", 64).await.unwrap(), "Hello");
}

#[tokio::test]
async fn test_upstream_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(json!({"error": "Model is currently loading", "estimated_time": 20.0})),
        )
        .mount(&server)
        .await;

    let engine = RemoteEngine::new(&remote_config(&server)).unwrap();
    let model = engine
        .load(
            &LanguagePair::new("en", "ru"),
            &ModelSpec::new("Helsinki-NLP/opus-mt-en-ru"),
        )
        .await
        .unwrap();

    let err = model.translate("Hello", 512).await.unwrap_err();
    assert!(matches!(err, AppError::BackendError(_)));
    assert!(err.to_string().contains("Model is currently loading"));

    // One failure does not take the endpoint out of rotation
    assert!(engine.endpoints()[0].healthy);
    assert_eq!(engine.endpoints()[0].consecutive_failures, 1);
}

#[tokio::test]
async fn test_endpoint_marked_unhealthy_after_repeated_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let engine = RemoteEngine::new(&remote_config(&server)).unwrap();
    let model = engine
        .load(
            &LanguagePair::new("en", "es"),
            &ModelSpec::new("Helsinki-NLP/opus-mt-en-es"),
        )
        .await
        .unwrap();

    for _ in 0..3 {
        assert!(model.translate("Hello", 512).await.is_err());
    }

    assert!(!engine.endpoints()[0].healthy);
    assert!(!engine.status().healthy);
}

#[tokio::test]
async fn test_health_check_calls_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let engine = RemoteEngine::new(&remote_config(&server)).unwrap();
    assert!(engine.health_check().await);
}

#[tokio::test]
async fn test_end_to_end_translation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/Helsinki-NLP/opus-mt-es-en"))
        .and(body_partial_json(json!({"inputs": "¿Dónde está la biblioteca?"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"translation_text": "Where is the library?"}])),
        )
        .expect(2)
        .mount(&server)
        .await;

    let mut settings = Settings::default();
    settings.rate_limit.enabled = false;
    settings.remote = remote_config(&server);

    let state = Arc::new(AppState::from_settings(settings).unwrap());
    let router = create_router(state.clone());

    for _ in 0..2 {
        let request = Request::builder()
            .method("POST")
            .uri("/translate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "text": "¿Dónde está la biblioteca?",
                    "source_lang": "es",
                    "target_lang": "en",
                })
                .to_string(),
            ))
            .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["translation"], "Where is the library?");
    }

    assert_eq!(state.cache.loaded_pairs(), vec![LanguagePair::new("es", "en")]);
}
