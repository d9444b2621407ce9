//! Embedding client for turning a query into a vector.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Provider, ProviderError};
use crate::models::EmbeddingConfig;
use crate::services::http::{build_client, post_json};

/// Anything that can embed a query text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Request body for the embedding endpoint.
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

/// Response from the embedding endpoint. Only `data[0]` is decoded; later
/// entries may hold anything.
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<serde_json::Value>,
}

fn malformed(reason: impl Into<String>) -> ProviderError {
    let reason = reason.into();
    warn!(provider = %Provider::Embedding, %reason, "embedding response has an unexpected shape");
    ProviderError::MalformedResponse {
        provider: Provider::Embedding,
        reason,
    }
}

/// Client for the remote embedding provider.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: Client,
    url: String,
}

impl EmbeddingClient {
    /// Create a new embedding client with the given configuration.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, ProviderError> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| ProviderError::Unavailable {
                provider: Provider::Embedding,
                message: "embedding URL is not configured".to_string(),
            })?;

        Ok(Self {
            client: build_client(Provider::Embedding, config.timeout_secs)?,
            url,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let response: EmbedResponse =
            post_json(&self.client, Provider::Embedding, &self.url, &EmbedRequest { text })
                .await?;

        let first = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| malformed("`data` holds no embedding"))?;

        let embedding: Vec<f32> = serde_json::from_value(first)
            .map_err(|e| malformed(format!("`data[0]` is not a vector: {e}")))?;
        if embedding.is_empty() {
            return Err(malformed("`data[0]` is empty"));
        }
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> EmbeddingClient {
        let config = EmbeddingConfig {
            url: Some(format!("{}/embed", server.uri())),
            ..Default::default()
        };
        EmbeddingClient::new(&config).unwrap()
    }

    #[test]
    fn test_missing_url() {
        let err = EmbeddingClient::new(&EmbeddingConfig::default()).unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_embed_uses_first_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"text": "what is a heap"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": [[0.1, 0.2, 0.3], [9.0, 9.0, 9.0]]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let embedding = client_for(&server).embed("what is a heap").await.unwrap();
        assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_non_200_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = client_for(&server).embed("q").await.unwrap_err();
        match err {
            ProviderError::Upstream {
                provider,
                status,
                body,
            } => {
                assert_eq!(provider, Provider::Embedding);
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_other_success_codes_are_upstream_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": [[1.0]]})))
            .mount(&server)
            .await;

        let err = client_for(&server).embed("q").await.unwrap_err();
        assert!(matches!(err, ProviderError::Upstream { status: 201, .. }));
        assert_eq!(err.status_code(), 502);
    }

    #[tokio::test]
    async fn test_entries_after_first_are_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": [[0.1, 0.2], "meta"]})),
            )
            .mount(&server)
            .await;

        let embedding = client_for(&server).embed("q").await.unwrap();
        assert_eq!(embedding, vec![0.1, 0.2]);
    }

    #[tokio::test]
    async fn test_malformed_bodies() {
        for body in [
            json!({}),
            json!({"data": []}),
            json!({"data": [[]]}),
            json!({"data": "nope"}),
            json!({"data": ["meta", [1.0]]}),
            json!({"data": [[1.0, "x"]]}),
            json!({"embeddings": [[1.0]]}),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
                .mount(&server)
                .await;

            let err = client_for(&server).embed("q").await.unwrap_err();
            assert!(
                matches!(err, ProviderError::MalformedResponse { .. }),
                "body {body} gave {err:?}"
            );
            assert_eq!(err.status_code(), 500);
        }
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).embed("q").await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": [[1.0]]}))
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = EmbeddingConfig {
            url: Some(server.uri()),
            timeout_secs: 1,
        };
        let err = EmbeddingClient::new(&config)
            .unwrap()
            .embed("q")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        let config = EmbeddingConfig {
            url: Some("http://127.0.0.1:1/embed".to_string()),
            ..Default::default()
        };
        let err = EmbeddingClient::new(&config)
            .unwrap()
            .embed("q")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable { .. }));
        assert_eq!(err.status_code(), 503);
    }
}
