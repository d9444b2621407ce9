pub mod embedding;
pub mod generation;
mod http;
pub mod index;
mod metrics;
pub mod pipeline;
pub mod retriever;

pub use embedding::{EmbeddingClient, EmbeddingProvider};
pub use generation::{AnswerGenerator, ChatMessage, GenerationClient, Prompt, SYSTEM_INSTRUCTION};
pub use index::{Metric, Neighbor, VectorIndex, decode_flat_index, encode_flat_index};
pub use metrics::{MetricsStore, MetricsSummary};
pub use pipeline::{CONTEXT_SEPARATOR, QaPipeline, join_context};
pub use retriever::{ContextRetriever, IndexRetriever};
