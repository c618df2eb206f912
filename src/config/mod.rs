//! Configuration loading

pub mod settings;

pub use settings::{
    default_language_pairs, EngineAuth, EngineKind, LanguagePairConfig, LocalEngineConfig,
    LoggingConfig, RateLimitConfig, RemoteEngineConfig, ServerConfig, Settings,
    TranslationConfig,
};
