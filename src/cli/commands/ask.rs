use std::path::Path;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::get_formatter;
use crate::client::BackendClient;
use crate::error::AppError;
use crate::models::{AnswerResponse, Config, OutputFormat};
use crate::services::{QaPipeline, VectorIndex};

#[derive(Debug, Args)]
pub struct AskArgs {
    #[arg(required = true, help = "Question to answer")]
    pub question: String,

    #[arg(
        long,
        short = 'r',
        help = "Ask a running server instead of answering locally (e.g. http://localhost:8001)"
    )]
    pub remote: Option<String>,

    #[arg(long, short = 'k', help = "Number of chunks to retrieve (local mode only)")]
    pub top_k: Option<usize>,
}

pub async fn handle_ask(
    args: AskArgs,
    format: OutputFormat,
    config_path: Option<&Path>,
) -> Result<()> {
    let question = args.question.trim();
    if question.is_empty() {
        anyhow::bail!("question cannot be empty");
    }

    let formatter = get_formatter(format);

    let answer = match args.remote {
        Some(ref url) => {
            answer_remotely(question, url)
                .await
                .with_context(|| format!("request to {} failed", url))?
        }
        None => answer_locally(question, args.top_k, config_path).await?,
    };

    print!("{}", formatter.format_answer(question, &answer));
    Ok(())
}

async fn answer_remotely(question: &str, url: &str) -> Result<AnswerResponse, AppError> {
    let client = BackendClient::new(url)?;
    Ok(client.ask(question).await?)
}

async fn answer_locally(
    question: &str,
    top_k: Option<usize>,
    config_path: Option<&Path>,
) -> Result<AnswerResponse, AppError> {
    let mut config = Config::load(config_path)?;
    if let Some(top_k) = top_k {
        config.index.top_k = top_k;
    }
    config.require_endpoints()?;

    let index = VectorIndex::load(&config.index.vectors_path, &config.index.metadata_path)?;
    let pipeline = QaPipeline::from_config(&config, Arc::new(index))?;
    let answer = pipeline.answer_query(question).await?;
    Ok(answer.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_index_is_index_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.embedding.url = Some("http://127.0.0.1:1/embed".to_string());
        config.generation.url = Some("http://127.0.0.1:1/generate".to_string());
        config.index.vectors_path = dir.path().join("missing.faiss");
        config.index.metadata_path = dir.path().join("missing.json");
        let path = dir.path().join("config.toml");
        config.save(&path).unwrap();

        let err = answer_locally("q", None, Some(&path)).await.unwrap_err();
        assert!(matches!(err, AppError::Index(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_remote_failure_is_client_error() {
        let err = answer_remotely("q", "http://127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, AppError::Client(_)));
    }
}
