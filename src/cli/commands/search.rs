use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::{ChunkResults, get_formatter};
use crate::models::{Config, OutputFormat};
use crate::services::{ContextRetriever, EmbeddingClient, IndexRetriever};

use super::load_index;

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Search query text")]
    pub query: String,

    #[arg(long, short = 'k', help = "Number of chunks to retrieve")]
    pub top_k: Option<usize>,
}

pub async fn handle_search(
    args: SearchArgs,
    format: OutputFormat,
    verbose: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("search query cannot be empty");
    }

    let config = Config::load(config_path)?;
    let top_k = args.top_k.unwrap_or(config.index.top_k);
    if top_k == 0 {
        anyhow::bail!("top-k must be at least 1");
    }
    if config.embedding.url.is_none() {
        anyhow::bail!("missing Embedding URL in env variables");
    }

    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let index = load_index(&config)?;
    let embedder = Arc::new(EmbeddingClient::new(&config.embedding)?);
    let retriever = IndexRetriever::new(embedder, index);

    if verbose {
        eprintln!("Query: \"{query}\"");
        eprintln!("  Top-k: {top_k}");
        eprintln!("  Index: {} chunks", retriever.index().len());
    }

    let chunks = retriever
        .retrieve(query, top_k)
        .await
        .context("retrieval failed")?;

    let results = ChunkResults {
        query: query.to_string(),
        chunks,
        duration_ms: start_time.elapsed().as_millis() as u64,
    };
    print!("{}", formatter.format_chunks(&results));

    Ok(())
}
