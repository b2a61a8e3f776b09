use super::*;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn defaults_are_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.embedding.dimension, 1024);
    assert_eq!(config.embedding.batch_size, 96);
    assert_eq!(config.retrieval.default_top_k, 5);
    assert_eq!(config.cache.ttl_seconds, 300);
}

#[test]
fn load_missing_file_uses_defaults() {
    let config = Config::load("/nonexistent/config.toml").expect("load should fall back");
    assert_eq!(config.completion.model, "gemini-2.0-flash");
}

#[test]
fn load_partial_file_merges_defaults() {
    let mut file = NamedTempFile::new().expect("can create temp file");
    writeln!(
        file,
        "[retrieval]\ndefault_top_k = 8\n\n[completion]\nmodel = \"gpt-4o\"\n"
    )
    .expect("can write temp file");

    let config = Config::load(file.path()).expect("load should succeed");
    assert_eq!(config.retrieval.default_top_k, 8);
    assert_eq!(config.completion.model, "gpt-4o");
    // Untouched sections keep their defaults
    assert_eq!(config.session.timeout_minutes, 30);
}

#[test]
fn rejects_invalid_top_k() {
    let config = Config {
        retrieval: RetrievalConfig { default_top_k: 0 },
        ..Config::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidTopK(0))
    ));
}

#[test]
fn rejects_invalid_temperature() {
    let config = Config {
        completion: CompletionConfig {
            temperature: 1.5,
            ..CompletionConfig::default()
        },
        ..Config::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidTemperature(_))
    ));
}

#[test]
fn rejects_oversized_batch() {
    let config = Config {
        embedding: EmbeddingConfig {
            batch_size: 200,
            ..EmbeddingConfig::default()
        },
        ..Config::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidBatchSize(200))
    ));
}

#[test]
fn rejects_malformed_url() {
    let config = Config {
        vector_store: VectorStoreConfig {
            url: "not a url".to_string(),
            ..VectorStoreConfig::default()
        },
        ..Config::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidUrl(_))
    ));
}
