use std::any::Any;
use std::sync::atomic::Ordering;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{Instrument, info_span, warn};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::{AnswerResponse, ErrorResponse, HealthResponse, QueryRequest};
use crate::server::AppState;
use crate::server::protocol::{IndexSummary, StatusResponse};

/// Structured error body returned with the matching HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status_code: u16, detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::from_u16(status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            detail: detail.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self::new(e.status_code(), e.detail())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            status_code: self.status.as_u16(),
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::running())
}

pub async fn start(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejected query body");
        ApiError::from(rejection)
    })?;

    let request_id = Uuid::new_v4();
    let span = info_span!("query", %request_id);
    let started = Instant::now();

    // A panic inside the pipeline surfaces here as a JoinError.
    let pipeline = state.pipeline.clone();
    let handle = tokio::spawn(
        async move { pipeline.answer_query(&request.query).await }.instrument(span),
    );
    let result = match handle.await {
        Ok(result) => result,
        Err(join_error) => Err(PipelineError::Internal(join_message(join_error))),
    };

    state.requests_served.fetch_add(1, Ordering::Relaxed);
    let status_code = result.as_ref().map_or_else(PipelineError::status_code, |_| 200);
    state
        .record(started.elapsed().as_millis() as u64, status_code)
        .await;

    let answer = result?;
    Ok(Json(answer.into_response()))
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running".to_string(),
        started_at: state.started_at.to_rfc3339(),
        requests_served: state.requests_served.load(Ordering::Relaxed),
        index: IndexSummary::from(state.index.as_ref()),
        metrics: state.metrics_summary().await,
    })
}

fn join_message(join_error: tokio::task::JoinError) -> String {
    if !join_error.is_panic() {
        return join_error.to_string();
    }
    panic_message(join_error.into_panic())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "internal error".to_string()
    }
}
