use super::*;
use crate::config::{EmbeddingConfig, VectorStoreConfig};
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pipeline_for(server: &MockServer) -> IngestionPipeline {
    let embeddings = EmbeddingClient::new(&EmbeddingConfig {
        url: server.uri(),
        api_key: "test-key".to_string(),
        model: "embed-multilingual-v3.0".to_string(),
        dimension: 4,
        batch_size: 96,
    })
    .unwrap();

    let store = VectorStoreClient::new(&VectorStoreConfig {
        url: server.uri(),
        api_key: String::new(),
        collection: "textbook_chunks".to_string(),
    })
    .unwrap();

    IngestionPipeline::new(embeddings, store)
}

async fn mount_healthy_backends(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/collections/textbook_chunks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": {} })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.1, 0.2, 0.3, 0.4]]
        })))
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/collections/textbook_chunks/points"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": {} })))
        .mount(server)
        .await;
}

fn jsonl_file(lines: &[serde_json::Value]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file
}

#[tokio::test]
async fn ingests_pages_and_counts_chunks() {
    let server = MockServer::start().await;
    mount_healthy_backends(&server).await;

    let file = jsonl_file(&[json!({
        "url": "https://textbook.example.com/docs/dynamics",
        "text": "# Dynamics\n\nTorque is the rotational analogue of force in rigid body motion."
    })]);

    let pipeline = pipeline_for(&server);
    let stats = pipeline.ingest_file(file.path()).await.unwrap();

    assert_eq!(stats.pages_processed, 1);
    assert_eq!(stats.chunks_created, 1);
    assert_eq!(stats.chunks_stored, 1);
    assert_eq!(stats.errors_encountered, 0);
}

#[tokio::test]
async fn malformed_lines_are_counted_not_fatal() {
    let server = MockServer::start().await;
    mount_healthy_backends(&server).await;

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "not json at all").unwrap();
    writeln!(
        file,
        "{}",
        json!({
            "url": "https://textbook.example.com/docs/control",
            "text": "# Control\n\nFeedback controllers compare measured state to the setpoint."
        })
    )
    .unwrap();

    let pipeline = pipeline_for(&server);
    let stats = pipeline.ingest_file(file.path()).await.unwrap();

    assert_eq!(stats.pages_processed, 1);
    assert_eq!(stats.errors_encountered, 1);
}

#[tokio::test]
async fn embedding_failure_isolates_the_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/collections/textbook_chunks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": {} })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let file = jsonl_file(&[
        json!({
            "url": "https://textbook.example.com/docs/a",
            "text": "# A\n\nSome content that will fail to embed this run."
        }),
        json!({
            "url": "https://textbook.example.com/docs/b",
            "text": "# B\n\nMore content that will also fail to embed."
        }),
    ]);

    let pipeline = pipeline_for(&server);
    let stats = pipeline.ingest_file(file.path()).await.unwrap();

    assert_eq!(stats.pages_processed, 0);
    assert_eq!(stats.errors_encountered, 2);
    assert_eq!(stats.chunks_stored, 0);
}

#[tokio::test]
async fn missing_collection_is_created_before_upserts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/collections/textbook_chunks"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/collections/textbook_chunks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.1, 0.2, 0.3, 0.4]]
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/collections/textbook_chunks/points"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let file = jsonl_file(&[json!({
        "url": "https://textbook.example.com/docs/perception",
        "text": "# Perception\n\nCameras and lidar provide complementary views of the scene."
    })]);

    let pipeline = pipeline_for(&server);
    let stats = pipeline.ingest_file(file.path()).await.unwrap();

    assert_eq!(stats.chunks_stored, 1);
}
