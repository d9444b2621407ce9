//! Error types for the DSA question answering service.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Remote service a [`ProviderError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Embedding,
    Generation,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Embedding => write!(f, "Embedding"),
            Provider::Generation => write!(f, "LLM"),
        }
    }
}

/// Errors raised by a single call to the embedding or generation provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider answered with a non-200 status.
    #[error("{provider} API Error: {body}")]
    Upstream {
        provider: Provider,
        status: u16,
        body: String,
    },

    /// The provider answered 200 but the body did not have the expected shape.
    #[error("Invalid response format from {provider} API")]
    MalformedResponse { provider: Provider, reason: String },

    /// The provider could not be reached (DNS, refused connection, broken body).
    #[error("{provider} API unavailable: {message}")]
    Unavailable { provider: Provider, message: String },

    #[error("{provider} API timed out")]
    Timeout { provider: Provider },
}

impl ProviderError {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderError::Upstream { provider, .. }
            | ProviderError::MalformedResponse { provider, .. }
            | ProviderError::Unavailable { provider, .. }
            | ProviderError::Timeout { provider } => *provider,
        }
    }

    /// HTTP status surfaced to the caller. Only client and server error
    /// statuses pass through; anything else the provider sent becomes 502.
    pub fn status_code(&self) -> u16 {
        match self {
            ProviderError::Upstream { status, .. } if (400..=599).contains(status) => *status,
            ProviderError::Upstream { .. } => 502,
            ProviderError::MalformedResponse { .. } => 500,
            ProviderError::Unavailable { .. } => 503,
            ProviderError::Timeout { .. } => 504,
        }
    }
}

/// Errors related to the persisted vector index and its chunk metadata.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid index file: {0}")]
    Format(String),

    #[error("invalid metadata file: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("index holds {vectors} vectors but metadata holds {chunks} chunks")]
    LengthMismatch { vectors: usize, chunks: usize },

    #[error("query vector has dimension {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors produced while answering a query.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("index search failed: {0}")]
    Index(#[from] IndexError),

    #[error("request deadline of {}s exceeded", .0.as_secs_f64())]
    DeadlineExceeded(Duration),

    #[error("{0}")]
    Internal(String),
}

impl PipelineError {
    /// HTTP status surfaced to the caller.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::Provider(e) => e.status_code(),
            PipelineError::DeadlineExceeded(_) => 504,
            PipelineError::Index(_) | PipelineError::Internal(_) => 500,
        }
    }

    /// Human readable detail surfaced to the caller.
    pub fn detail(&self) -> String {
        self.to_string()
    }
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors returned by [`crate::client::BackendClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Missing 'question'")]
    EmptyQuestion,

    #[error("Backend error ({status}): {body}")]
    Backend { status: u16, body: String },

    #[error("Backend response missing 'decision'")]
    MissingDecision,

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Client(#[from] ClientError),
}
