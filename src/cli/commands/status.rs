use std::path::Path;

use anyhow::Result;
use clap::Args;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::client::BackendClient;
use crate::models::{Config, OutputFormat};
use crate::server::protocol::{IndexSummary, StatusResponse};
use crate::services::VectorIndex;

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[arg(long, short = 'r', help = "Also query a running server (e.g. http://localhost:8001)")]
    pub remote: Option<String>,
}

pub async fn handle_status(
    args: StatusArgs,
    format: OutputFormat,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = Config::load(config_path)?;
    let formatter = get_formatter(format);

    let (index, index_error) =
        match VectorIndex::load(&config.index.vectors_path, &config.index.metadata_path) {
            Ok(index) => (Some(IndexSummary::from(&index)), None),
            Err(e) => (None, Some(e.to_string())),
        };

    let check = match args.remote {
        Some(ref url) => match BackendClient::new(url) {
            Ok(client) => check_server(&client).await,
            Err(e) => ServerCheck::down(e),
        },
        None => ServerCheck::default(),
    };

    let status = StatusInfo {
        embedding_url: config.embedding.url.clone(),
        generation_url: config.generation.url.clone(),
        vectors_path: config.index.vectors_path.display().to_string(),
        metadata_path: config.index.metadata_path.display().to_string(),
        index,
        index_error,
        server_url: args.remote,
        server: check.status,
        server_running: check.running,
        server_error: check.error,
    };

    print!("{}", formatter.format_status(&status));

    if let Err(e) = config.require_endpoints() {
        eprintln!();
        eprintln!("Warning: {e}");
        eprintln!("      Set Embedding_URL and LLM_URL in the environment or a .env file.");
    }

    Ok(())
}

#[derive(Debug, Default)]
struct ServerCheck {
    status: Option<StatusResponse>,
    running: bool,
    error: Option<String>,
}

impl ServerCheck {
    fn down(error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Ask a server for `/status`, falling back to the health check for servers
/// that only expose `/` and `/start`.
async fn check_server(client: &BackendClient) -> ServerCheck {
    let status_error = match client.status().await {
        Ok(status) => {
            return ServerCheck {
                status: Some(status),
                running: true,
                error: None,
            };
        }
        Err(e) => e,
    };

    match client.health().await {
        Ok(health) if health.status == "running" => ServerCheck {
            running: true,
            ..ServerCheck::default()
        },
        Ok(health) => ServerCheck::down(format!("server reports status '{}'", health.status)),
        Err(_) => ServerCheck::down(status_error),
    }
}
