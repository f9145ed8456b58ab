//! HTTP endpoint handlers.
//!
//! The handlers only translate between JSON and [`SummaryService`]; all
//! decoding, extraction and model traffic happens in the service.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::service::SummaryService;
use crate::settings::{Settings, SettingsSource, SettingsUpdate, SharedSettings};
use crate::summarize::ProgressSink;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: SummaryService,
    pub settings: SharedSettings,
}

impl AppState {
    pub fn new(service: SummaryService, settings: SharedSettings) -> Self {
        Self { service, settings }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Summaries
// =============================================================================

/// Summary request: a raw RFC 5322 message and an optional key.
#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    /// Defaults to the message's Message-Id header
    #[serde(default)]
    pub message_id: Option<String>,
    pub raw: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub message_id: String,
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: error.into() })).into_response()
}

/// Logs streamed partials; HTTP callers only see the final result.
fn progress_logger() -> Arc<dyn ProgressSink> {
    Arc::new(|key: &str, partial: &str, done: bool| {
        debug!(
            message_id = key,
            partial_length = partial.len(),
            done = done,
            "summary_progress"
        );
    })
}

/// Summarize a raw message.
pub async fn create_summary(
    State(state): State<AppState>,
    Json(request): Json<SummaryRequest>,
) -> Response {
    let explicit_key = request
        .message_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    info!(
        message_id = ?explicit_key,
        raw_length = request.raw.len(),
        "summary_request_received"
    );

    match state
        .service
        .summarize_raw(request.raw.as_bytes(), explicit_key, progress_logger())
        .await
    {
        Ok((message_id, result)) => {
            info!(message_id = %message_id, result = ?result, "summary_request_complete");
            (
                StatusCode::OK,
                Json(SummaryResponse {
                    message_id,
                    summary: result.to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            warn!(error = %e, "summary_request_rejected");
            error_response(StatusCode::BAD_REQUEST, format!("{e:#}"))
        }
    }
}

/// Cached summary for one message.
pub async fn get_summary(State(state): State<AppState>, Path(message_id): Path<String>) -> Response {
    match state.service.cached(&message_id) {
        Some(result) => (
            StatusCode::OK,
            Json(SummaryResponse {
                message_id,
                summary: result.to_string(),
            }),
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "no cached summary"),
    }
}

// =============================================================================
// Settings
// =============================================================================

pub async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json(state.settings.current())
}

/// Apply a partial settings change and return the result.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Json<Settings> {
    Json(state.settings.update(update))
}
