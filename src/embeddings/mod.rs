// Embeddings module
// HTTP client for the external embedding service

pub mod client;

pub use client::{EmbeddingClient, EmbeddingInput};
