mod config;
mod query;

pub use config::{
    Config, DEFAULT_METADATA_PATH, DEFAULT_PORT, DEFAULT_TOP_K, DEFAULT_VECTORS_PATH,
    EMBEDDING_URL_ENV, EmbeddingConfig, GenerationConfig, IndexConfig, LLM_URL_ENV, MetricsConfig,
    ServerConfig,
};
pub use query::{
    Answer, AnswerResponse, ErrorResponse, HealthResponse, OutputFormat, QueryRequest,
    RetrievedChunk, format_elapsed,
};
