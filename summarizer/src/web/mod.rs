//! HTTP front end.
//!
//! Stands in for the mail client: raw messages come in, summaries go out,
//! and settings can be read and changed at runtime.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    create_summary, get_settings, get_summary, health, update_settings, AppState, ErrorResponse,
    HealthResponse, SummaryRequest, SummaryResponse,
};

/// All routes with request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/summaries", post(create_summary))
        .route("/summaries/:id", get(get_summary))
        .route("/settings", get(get_settings).put(update_settings))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
