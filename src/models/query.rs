//! Query, answer and wire models.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Inbound question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// One chunk returned by retrieval, nearest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Position in the index and in the chunk sequence
    pub position: usize,

    /// Distance from the query embedding (smaller is nearer)
    pub distance: f32,

    pub text: String,
}

/// Generated answer together with the wall-clock time of the whole pipeline.
#[derive(Debug, Clone)]
pub struct Answer {
    pub decision: String,
    pub elapsed: Duration,
}

impl Answer {
    /// Elapsed seconds with four decimals, e.g. `1.2345s`.
    pub fn formatted_elapsed(&self) -> String {
        format_elapsed(self.elapsed)
    }

    pub fn into_response(self) -> AnswerResponse {
        AnswerResponse {
            time: self.formatted_elapsed(),
            decision: self.decision,
        }
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.4}s", elapsed.as_secs_f64())
}

/// Success body of the answer endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub decision: String,
    pub time: String,
}

/// Failure body of every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status_code: u16,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn running() -> Self {
        Self {
            status: "running".to_string(),
        }
    }
}
