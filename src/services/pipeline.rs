//! Question answering pipeline: retrieve, then generate.
//!
//! [`QaPipeline`] runs the two stages strictly in sequence for each query.
//! There is no fan-out, no retry and no partial result: if generation fails
//! after retrieval succeeded, the whole query fails with the generation error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::error::{PipelineError, ProviderError};
use crate::models::{Answer, Config, RetrievedChunk};
use crate::services::embedding::EmbeddingClient;
use crate::services::generation::{AnswerGenerator, GenerationClient};
use crate::services::index::VectorIndex;
use crate::services::retriever::{ContextRetriever, IndexRetriever};

/// Separator placed between retrieved chunks in the generation context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

pub struct QaPipeline {
    retriever: Arc<dyn ContextRetriever>,
    generator: Arc<dyn AnswerGenerator>,
    top_k: usize,
    deadline: Option<Duration>,
}

impl QaPipeline {
    pub fn new(
        retriever: Arc<dyn ContextRetriever>,
        generator: Arc<dyn AnswerGenerator>,
        top_k: usize,
    ) -> Self {
        Self {
            retriever,
            generator,
            top_k,
            deadline: None,
        }
    }

    /// Bound both stages together by one end-to-end deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Wire the remote clients and the loaded index according to `config`.
    pub fn from_config(config: &Config, index: Arc<VectorIndex>) -> Result<Self, ProviderError> {
        let embedder = Arc::new(EmbeddingClient::new(&config.embedding)?);
        let generator = Arc::new(GenerationClient::new(&config.generation)?);
        let retriever = Arc::new(IndexRetriever::new(embedder, index));

        let pipeline = Self::new(retriever, generator, config.index.top_k);
        Ok(match config.server.request_timeout_secs {
            0 => pipeline,
            secs => pipeline.with_deadline(Duration::from_secs(secs)),
        })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn retriever(&self) -> &Arc<dyn ContextRetriever> {
        &self.retriever
    }

    /// Answer `query` and report how long the two stages took.
    pub async fn answer_query(&self, query: &str) -> Result<Answer, PipelineError> {
        let start = Instant::now();

        let result = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.run_stages(query))
                .await
                .unwrap_or(Err(PipelineError::DeadlineExceeded(deadline))),
            None => self.run_stages(query).await,
        };
        let elapsed = start.elapsed();

        match result {
            Ok(decision) => {
                info!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    answer_len = decision.len(),
                    "query answered"
                );
                Ok(Answer { decision, elapsed })
            }
            Err(e) => {
                error!(
                    status = e.status_code(),
                    error = %e,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "query failed"
                );
                Err(e)
            }
        }
    }

    async fn run_stages(&self, query: &str) -> Result<String, PipelineError> {
        let chunks = self.retriever.retrieve(query, self.top_k).await?;
        info!(top_k = self.top_k, retrieved = chunks.len(), "retrieval finished");

        let context = join_context(&chunks);
        let decision = self.generator.generate(query, &context).await?;
        Ok(decision)
    }
}

/// Join chunk texts nearest first with [`CONTEXT_SEPARATOR`].
pub fn join_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Provider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubRetriever {
        texts: Vec<&'static str>,
        delay: Duration,
    }

    impl StubRetriever {
        fn new(texts: Vec<&'static str>) -> Self {
            Self {
                texts,
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl ContextRetriever for StubRetriever {
        async fn retrieve(
            &self,
            _query: &str,
            top_k: usize,
        ) -> Result<Vec<RetrievedChunk>, PipelineError> {
            tokio::time::sleep(self.delay).await;
            Ok(self
                .texts
                .iter()
                .take(top_k)
                .enumerate()
                .map(|(position, text)| RetrievedChunk {
                    position,
                    distance: position as f32,
                    text: text.to_string(),
                })
                .collect())
        }
    }

    struct FailingRetriever;

    #[async_trait]
    impl ContextRetriever for FailingRetriever {
        async fn retrieve(
            &self,
            _query: &str,
            _top_k: usize,
        ) -> Result<Vec<RetrievedChunk>, PipelineError> {
            Err(ProviderError::Upstream {
                provider: Provider::Embedding,
                status: 503,
                body: "overloaded".to_string(),
            }
            .into())
        }
    }

    /// Answers with the context it was given.
    struct EchoGenerator {
        delay: Duration,
        calls: AtomicU32,
    }

    impl EchoGenerator {
        fn new() -> Self {
            Self {
                delay: Duration::ZERO,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl AnswerGenerator for EchoGenerator {
        async fn generate(&self, _question: &str, context: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(context.to_string())
        }
    }

    struct MalformedGenerator;

    #[async_trait]
    impl AnswerGenerator for MalformedGenerator {
        async fn generate(&self, _question: &str, _context: &str) -> Result<String, ProviderError> {
            Err(ProviderError::MalformedResponse {
                provider: Provider::Generation,
                reason: "missing field `response`".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_context_joined_with_separator() {
        let pipeline = QaPipeline::new(
            Arc::new(StubRetriever::new(vec!["A", "B"])),
            Arc::new(EchoGenerator::new()),
            5,
        );

        let answer = pipeline.answer_query("anything").await.unwrap();
        assert_eq!(answer.decision, "A\n\nB");
    }

    #[tokio::test]
    async fn test_top_k_forwarded_to_retriever() {
        let pipeline = QaPipeline::new(
            Arc::new(StubRetriever::new(vec!["A", "B", "C"])),
            Arc::new(EchoGenerator::new()),
            2,
        );

        let answer = pipeline.answer_query("q").await.unwrap();
        assert_eq!(answer.decision, "A\n\nB");
        assert_eq!(pipeline.top_k(), 2);
    }

    #[tokio::test]
    async fn test_retrieval_failure_skips_generation() {
        let generator = Arc::new(EchoGenerator::new());
        let pipeline = QaPipeline::new(Arc::new(FailingRetriever), generator.clone(), 5);

        let err = pipeline.answer_query("q").await.unwrap_err();
        assert_eq!(err.status_code(), 503);
        assert!(err.detail().contains("overloaded"));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_fails_whole_query() {
        let pipeline = QaPipeline::new(
            Arc::new(StubRetriever::new(vec!["A"])),
            Arc::new(MalformedGenerator),
            5,
        );

        let err = pipeline.answer_query("q").await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.detail(), "Invalid response format from LLM API");
    }

    #[tokio::test]
    async fn test_elapsed_covers_both_stages() {
        let retriever = StubRetriever {
            texts: vec!["A"],
            delay: Duration::from_millis(100),
        };
        let generator = EchoGenerator {
            delay: Duration::from_millis(100),
            calls: AtomicU32::new(0),
        };
        let pipeline = QaPipeline::new(Arc::new(retriever), Arc::new(generator), 5);

        let answer = pipeline.answer_query("q").await.unwrap();
        assert!(answer.elapsed >= Duration::from_millis(200));
        let reported: f64 = answer
            .formatted_elapsed()
            .trim_end_matches('s')
            .parse()
            .unwrap();
        assert!(reported >= 0.2);
    }

    #[tokio::test]
    async fn test_deadline_spans_both_stages() {
        let retriever = StubRetriever {
            texts: vec!["A"],
            delay: Duration::from_millis(150),
        };
        let generator = EchoGenerator {
            delay: Duration::from_millis(150),
            calls: AtomicU32::new(0),
        };
        let pipeline = QaPipeline::new(Arc::new(retriever), Arc::new(generator), 5)
            .with_deadline(Duration::from_millis(200));

        let err = pipeline.answer_query("q").await.unwrap_err();
        assert!(matches!(err, PipelineError::DeadlineExceeded(_)));
        assert_eq!(err.status_code(), 504);
    }

    #[test]
    fn test_join_context_empty() {
        assert_eq!(join_context(&[]), "");
    }
}
