//! HTTP client for a running answer service.
//!
//! This is the contract the web form proxy relies on: post `{query}` to
//! `/start`, relay `decision`/`time`, and turn every failure into a
//! [`ClientError`].

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::warn;

use crate::error::ClientError;
use crate::models::{AnswerResponse, HealthResponse, QueryRequest};
use crate::server::protocol::StatusResponse;

pub const BACKEND_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct RawAnswer {
    #[serde(default)]
    decision: Option<String>,
    #[serde(default)]
    time: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(BACKEND_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClientError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn ask(&self, question: &str) -> Result<AnswerResponse, ClientError> {
        if question.trim().is_empty() {
            return Err(ClientError::EmptyQuestion);
        }

        let url = format!("{}/start", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&QueryRequest {
                query: question.to_string(),
            })
            .send()
            .await
            .map_err(|e| ClientError::Unavailable(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(backend_error(response).await);
        }

        let raw: RawAnswer = response
            .json()
            .await
            .map_err(|e| ClientError::Unavailable(e.to_string()))?;

        match raw.decision {
            Some(decision) if !decision.is_empty() => Ok(AnswerResponse {
                decision,
                time: raw.time.unwrap_or_default(),
            }),
            _ => Err(ClientError::MissingDecision),
        }
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.get_json("/").await
    }

    pub async fn status(&self) -> Result<StatusResponse, ClientError> {
        self.get_json("/status").await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Unavailable(e.to_string()))
    }
}

async fn backend_error(response: Response) -> ClientError {
    let status = response.status().as_u16();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(status, error = %e, "failed to read backend error body");
            String::new()
        }
    };
    ClientError::Backend { status, body }
}
