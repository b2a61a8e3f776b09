use super::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(url: &str) -> EmbeddingConfig {
    EmbeddingConfig {
        url: url.to_string(),
        api_key: "test-key".to_string(),
        model: "embed-multilingual-v3.0".to_string(),
        dimension: 4,
        batch_size: 2,
    }
}

#[tokio::test]
async fn embeds_single_query() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .and(body_partial_json(json!({ "input_type": "search_query" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.1, 0.2, 0.3, 0.4]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(&test_config(&server.uri())).unwrap();
    let vector = client.embed_query("what is robotics?").await.unwrap();

    assert_eq!(vector, vec![0.1, 0.2, 0.3, 0.4]);
}

#[tokio::test]
async fn splits_documents_into_batches() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .and(body_partial_json(json!({ "input_type": "search_document" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.0, 0.0, 0.0, 0.0], [1.0, 1.0, 1.0, 1.0]]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(&test_config(&server.uri())).unwrap();
    let texts: Vec<String> = (0..4).map(|i| format!("chunk {i}")).collect();
    let vectors = client.embed_documents(&texts).await.unwrap();

    assert_eq!(vectors.len(), 4);
}

#[tokio::test]
async fn empty_document_list_makes_no_requests() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(&test_config(&server.uri())).unwrap();
    let vectors = client.embed_documents(&[]).await.unwrap();

    assert!(vectors.is_empty());
}

#[tokio::test]
async fn rejects_count_mismatch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.1, 0.2, 0.3, 0.4], [0.5, 0.6, 0.7, 0.8]]
        })))
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(&test_config(&server.uri())).unwrap();
    let result = client.embed_query("one text").await;

    assert!(result.is_err());
}

#[tokio::test]
async fn rejects_dimension_mismatch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.1, 0.2]]
        })))
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(&test_config(&server.uri())).unwrap();
    let result = client.embed_query("one text").await;

    assert!(result.is_err());
}

#[tokio::test]
async fn surfaces_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(&test_config(&server.uri())).unwrap();
    let result = client.embed_query("one text").await;

    assert!(result.is_err());
}
