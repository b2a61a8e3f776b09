use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod cache;
pub mod config;
pub mod embeddings;
pub mod generation;
pub mod ingest;
pub mod retrieval;
pub mod server;
pub mod service;
pub mod session;
pub mod validation;
pub mod vector_store;
