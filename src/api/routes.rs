//! HTTP route definitions

use crate::api::handlers;
use crate::api::models::*;
use crate::engine::EngineStatus;
use crate::middleware::{rate_limit, timeout};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "OPUS-MT Translate Gateway API",
        description = "Machine translation over HTTP, one pretrained model per language pair.",
        license(name = "MIT"),
    ),
    paths(
        handlers::translate,
        handlers::languages,
        handlers::list_models,
        handlers::health_check,
    ),
    components(schemas(
        TranslateRequest,
        TranslateResponse,
        ErrorResponse,
        LanguagesResponse,
        ModelEntry,
        ModelListResponse,
        HealthResponse,
        EngineStatus,
    )),
    tags(
        (name = "Translation", description = "Translation endpoints"),
        (name = "Models", description = "Model cache inspection"),
        (name = "Health", description = "Health and monitoring endpoints"),
    )
)]
pub struct ApiDoc;

/// Create the main application router
pub fn create_router(state: Arc<crate::AppState>) -> Router {
    let server = state.settings.server.clone();
    let limiter = rate_limit::limiter(&state.settings.rate_limit);

    // Routes subject to rate limiting
    let app_routes = Router::new()
        .route("/", get(handlers::index))
        .route("/translate", post(handlers::translate))
        .route("/languages", get(handlers::languages))
        .route("/models", get(handlers::list_models))
        .nest_service("/static", ServeDir::new(&server.static_dir));

    let app_routes = match limiter {
        Some(limiter) => {
            app_routes.layer(middleware::from_fn_with_state(limiter, rate_limit::enforce))
        }
        None => app_routes,
    };

    let router = Router::new()
        // Health check endpoint (never rate limited)
        .route("/health", get(handlers::health_check))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(app_routes)
        .with_state(state);

    timeout::apply(router, server.request_timeout_secs)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
