// Configuration module
// Loads and validates service settings from a TOML file with env overrides

pub mod settings;

pub use settings::{
    CacheConfig, CompletionConfig, Config, ConfigError, EmbeddingConfig, RetrievalConfig,
    ServerConfig, SessionConfig, VectorStoreConfig,
};
