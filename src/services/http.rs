//! Single-attempt JSON POST shared by the provider clients.

use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{Provider, ProviderError};

pub(crate) fn build_client(provider: Provider, timeout_secs: u64) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::Unavailable {
            provider,
            message: e.to_string(),
        })
}

/// POST `body` to `url` and decode a 200 response into `T`.
///
/// Any status other than 200 becomes [`ProviderError::Upstream`] carrying the
/// raw response text; a 200 body that does not decode into `T` becomes
/// [`ProviderError::MalformedResponse`]. No retries.
pub(crate) async fn post_json<B, T>(
    client: &Client,
    provider: Provider,
    url: &str,
    body: &B,
) -> Result<T, ProviderError>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let start = Instant::now();
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| transport_error(provider, e))?;

    let status = response.status();
    debug!(
        %provider,
        status = status.as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "provider responded"
    );

    if status != StatusCode::OK {
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(%provider, error = %e, "failed to read provider error body");
                String::new()
            }
        };
        warn!(%provider, status = status.as_u16(), "provider returned an error status");
        return Err(ProviderError::Upstream {
            provider,
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(provider, e))?;

    serde_json::from_slice(&bytes).map_err(|e| {
        warn!(%provider, error = %e, "provider response has an unexpected shape");
        ProviderError::MalformedResponse {
            provider,
            reason: e.to_string(),
        }
    })
}

fn transport_error(provider: Provider, e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        warn!(%provider, "provider call timed out");
        ProviderError::Timeout { provider }
    } else {
        warn!(%provider, error = %e, "provider unreachable");
        ProviderError::Unavailable {
            provider,
            message: e.to_string(),
        }
    }
}
