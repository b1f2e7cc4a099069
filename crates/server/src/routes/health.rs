use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

/// Health check endpoint (liveness)
/// Returns 200 if the process is serving HTTP, whatever the engine phase
pub async fn health_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "ocrd-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
    }))
}

/// Readiness check endpoint
/// Returns 200 once the engine handle is ready, 503 otherwise. A failed
/// initialization reports its cause here.
pub async fn readiness_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let phase = state.engine.phase();
    let status = if phase.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let mut engine = json!({
        "phase": phase.as_str(),
        "language": state.config.ocr.language.as_str(),
        "workers": state.config.ocr.workers,
    });
    if let Some(cause) = phase.failure() {
        engine["cause"] = json!(cause);
    }

    (
        status,
        Json(json!({
            "status": if phase.is_ready() { "ready" } else { "not_ready" },
            "service": "ocrd-server",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "uptime_seconds": state.uptime_seconds(),
            "components": {
                "api": "ready",
                "engine": engine,
            }
        })),
    )
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    let handle = state.metrics.as_ref().ok_or(ServerError::NotFound)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}
