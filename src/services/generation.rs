//! Generation client: prompt assembly and the completion call.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Provider, ProviderError};
use crate::models::GenerationConfig;
use crate::services::http::{build_client, post_json};

pub const SYSTEM_INSTRUCTION: &str = "You are a precise Data Structures and Algorithms expert. \
Always provide complete answers with full pseudo code and time complexity.";

/// Anything that can answer a question given retrieved context.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question: &str, context: &str) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// System instruction plus the templated user turn.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub messages: Vec<ChatMessage>,
}

impl Prompt {
    pub fn build(question: &str, context: &str) -> Self {
        let user = format!(
            "Question:\n{question}\n\nContext:\n{context}\n\n\
             Give concise answer with steps and time complexity."
        );
        Self {
            messages: vec![
                ChatMessage::new("system", SYSTEM_INSTRUCTION),
                ChatMessage::new("user", user),
            ],
        }
    }
}

/// Request body for the completion endpoint.
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    response: String,
}

/// Client for the remote completion provider.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    client: Client,
    url: String,
    max_tokens: u32,
    temperature: f32,
}

impl GenerationClient {
    pub fn new(config: &GenerationConfig) -> Result<Self, ProviderError> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| ProviderError::Unavailable {
                provider: Provider::Generation,
                message: "LLM URL is not configured".to_string(),
            })?;

        Ok(Self {
            client: build_client(Provider::Generation, config.timeout_secs)?,
            url,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AnswerGenerator for GenerationClient {
    /// The answer text is returned verbatim, even when it ran into the token budget.
    async fn generate(&self, question: &str, context: &str) -> Result<String, ProviderError> {
        let prompt = Prompt::build(question, context);
        let request = CompletionRequest {
            messages: &prompt.messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response: CompletionResponse =
            post_json(&self.client, Provider::Generation, &self.url, &request).await?;
        Ok(response.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn client_for(server: &MockServer) -> GenerationClient {
        let config = GenerationConfig {
            url: Some(format!("{}/generate", server.uri())),
            ..Default::default()
        };
        GenerationClient::new(&config).unwrap()
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = Prompt::build("Reverse a linked list", "Use three pointers.");
        assert_eq!(prompt.messages.len(), 2);
        assert_eq!(prompt.messages[0].role, "system");
        assert!(prompt.messages[0].content.contains("pseudo code"));
        assert_eq!(prompt.messages[1].role, "user");
        assert_eq!(
            prompt.messages[1].content,
            "Question:\nReverse a linked list\n\nContext:\nUse three pointers.\n\n\
             Give concise answer with steps and time complexity."
        );
    }

    #[tokio::test]
    async fn test_generate_sends_fixed_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"response": "O(n) answer"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let answer = client_for(&server)
            .generate("q?", "ctx")
            .await
            .unwrap();
        assert_eq!(answer, "O(n) answer");

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["max_tokens"], 300);
        let temperature = body["temperature"].as_f64().unwrap();
        assert!((temperature - 0.3).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("Question:\nq?"));
        assert!(user.contains("Context:\nctx"));
    }

    #[tokio::test]
    async fn test_answer_is_not_post_processed() {
        let server = MockServer::start().await;
        let long = "  step ".repeat(500);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": long})))
            .mount(&server)
            .await;

        let answer = client_for(&server).generate("q", "c").await.unwrap();
        assert_eq!(answer, long);
    }

    #[tokio::test]
    async fn test_missing_response_field_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let err = client_for(&server).generate("q", "c").await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::MalformedResponse {
                provider: Provider::Generation,
                ..
            }
        ));
        assert_eq!(err.to_string(), "Invalid response format from LLM API");
    }

    #[tokio::test]
    async fn test_upstream_error_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client_for(&server).generate("q", "c").await.unwrap_err();
        assert_eq!(err.status_code(), 429);
        assert_eq!(err.to_string(), "LLM API Error: rate limited");
    }
}
