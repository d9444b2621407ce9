use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::models::Config;
use crate::server::{AppState, run_server};
use crate::services::QaPipeline;

use super::load_index;

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, help = "Address to bind (overrides config and DSA_RAG_HOST)")]
    pub host: Option<String>,

    #[arg(long, short = 'p', help = "Port to listen on (overrides config and PORT)")]
    pub port: Option<u16>,
}

pub async fn handle_serve(args: ServeArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = Config::load(config_path)?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    config.require_endpoints()?;
    let index = load_index(&config)?;

    let pipeline = QaPipeline::from_config(&config, index.clone())
        .context("failed to build provider clients")?;
    info!(
        top_k = pipeline.top_k(),
        deadline_secs = config.server.request_timeout_secs,
        "pipeline ready"
    );

    let state = AppState::from_config(&config, Arc::new(pipeline), index);
    run_server(&config.server, state).await
}
