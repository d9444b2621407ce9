pub mod handlers;
pub mod protocol;

use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::Router;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::models::{Config, ServerConfig};
use crate::services::{MetricsStore, MetricsSummary, QaPipeline, VectorIndex};

/// Shared, read-only request context; cloned per request.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<QaPipeline>,
    index: Arc<VectorIndex>,
    metrics: Option<Arc<Mutex<MetricsStore>>>,
    retention_days: u32,
    requests_served: Arc<AtomicU64>,
    started_at: DateTime<Utc>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("chunks", &self.index.len())
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(pipeline: Arc<QaPipeline>, index: Arc<VectorIndex>) -> Self {
        Self {
            pipeline,
            index,
            metrics: None,
            retention_days: 0,
            requests_served: Arc::new(AtomicU64::new(0)),
            started_at: Utc::now(),
        }
    }

    pub fn with_metrics(mut self, store: MetricsStore, retention_days: u32) -> Self {
        self.metrics = Some(Arc::new(Mutex::new(store)));
        self.retention_days = retention_days;
        self
    }

    /// Build the state from configuration, opening the metrics store if enabled.
    pub fn from_config(config: &Config, pipeline: Arc<QaPipeline>, index: Arc<VectorIndex>) -> Self {
        let state = Self::new(pipeline, index);
        if !config.metrics.enabled {
            return state;
        }

        let Some(path) = Config::metrics_db_path() else {
            warn!("could not determine metrics directory, metrics disabled");
            return state;
        };
        match MetricsStore::open(&path) {
            Ok(store) => {
                store.cleanup(config.metrics.retention_days);
                info!(
                    path = %path.display(),
                    retention_days = config.metrics.retention_days,
                    "metrics enabled"
                );
                state.with_metrics(store, config.metrics.retention_days)
            }
            Err(e) => {
                warn!(error = %e, "failed to open metrics database, metrics disabled");
                state
            }
        }
    }

    /// Store one answer outcome. SQLite I/O runs on the blocking pool.
    async fn record(&self, elapsed_ms: u64, status_code: u16) {
        let Some(metrics) = self.metrics.clone() else {
            return;
        };
        let result = tokio::task::spawn_blocking(move || {
            if let Ok(store) = metrics.lock() {
                store.record(elapsed_ms, status_code);
            }
        })
        .await;
        if let Err(e) = result {
            warn!(error = %e, "metrics write task failed");
        }
    }

    async fn metrics_summary(&self) -> Option<MetricsSummary> {
        let metrics = self.metrics.clone()?;
        let window_days = self.retention_days;
        tokio::task::spawn_blocking(move || {
            metrics
                .lock()
                .ok()
                .map(|store| store.get_summary(window_days))
        })
        .await
        .ok()
        .flatten()
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/start", post(handlers::start))
        .route("/start/", post(handlers::start))
        .route("/status", get(handlers::status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid host/port {}:{}", config.host, config.port))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{}", addr);

    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
