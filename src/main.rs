//! Main entry point for the OPUS-MT Translate Gateway

use opus_translate_gateway::{
    api,
    config::{settings::DEFAULT_CONFIG_PATH, LoggingConfig, Settings},
    languages::LanguagePair,
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let config_path =
        std::env::var("TRANSLATOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let settings = Settings::load_from_path(&config_path)?;

    init_logging(&settings.logging);
    info!(config = %config_path, "Starting OPUS-MT Translate Gateway");

    settings.validate()?;
    info!(
        "Loaded configuration: server={}:{}, engine={}, pairs={}",
        settings.server.host,
        settings.server.port,
        settings.translation.engine,
        settings.language_pairs.len()
    );

    let preload: Vec<LanguagePair> = settings
        .translation
        .preload
        .iter()
        .map(|pair| pair.parse::<LanguagePair>())
        .collect::<Result<Vec<_>, _>>()?;
    let health_interval = settings.remote.health_check_interval_secs;
    let addr = format!("{}:{}", settings.server.host, settings.server.port);

    let state = Arc::new(AppState::from_settings(settings)?);

    if !preload.is_empty() {
        let loaded = state.cache.preload(&preload).await;
        info!(requested = preload.len(), loaded, "Preloaded models");
    }

    // Periodic endpoint probing
    if health_interval > 0 {
        let engine = state.cache.engine().clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(health_interval));
            loop {
                ticker.tick().await;
                if !engine.health_check().await {
                    warn!(engine = %engine.name(), "Translation engine is unhealthy");
                }
            }
        });
    }

    let app = api::routes::create_router(state);

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
