//! Retriever: embed the query, then look up its nearest chunks.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{IndexError, PipelineError};
use crate::models::RetrievedChunk;
use crate::services::embedding::EmbeddingProvider;
use crate::services::index::VectorIndex;

/// Produces the chunks most relevant to a query, nearest first.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, PipelineError>;

    /// Chunk texts only, in retrieval order.
    async fn retrieve_texts(&self, query: &str, top_k: usize) -> Result<Vec<String>, PipelineError> {
        let chunks = self.retrieve(query, top_k).await?;
        Ok(chunks.into_iter().map(|c| c.text).collect())
    }
}

/// Retriever backed by a remote embedding provider and the in-process index.
pub struct IndexRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
}

impl IndexRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }
}

#[async_trait]
impl ContextRetriever for IndexRetriever {
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, PipelineError> {
        let embedding = self.embedder.embed(query).await?;
        let neighbors = self.index.search(&embedding, top_k)?;

        let chunks = neighbors
            .into_iter()
            .map(|n| {
                let text = self.index.chunk(n.position).ok_or_else(|| {
                    IndexError::Format(format!("no chunk stored at position {}", n.position))
                })?;
                Ok(RetrievedChunk {
                    position: n.position,
                    distance: n.distance,
                    text: text.to_string(),
                })
            })
            .collect::<Result<Vec<_>, IndexError>>()?;

        debug!(top_k, returned = chunks.len(), "retrieved chunks");
        Ok(chunks)
    }
}
