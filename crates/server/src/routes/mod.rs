//! API route handlers
//!
//! - `ocr`: the recognition endpoint
//! - `health`: liveness, readiness and metrics

pub mod health;
pub mod ocr;

use crate::error::ServerError;
use crate::state::{ServerMetadata, ServerState};
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

/// Service info (GET /)
pub async fn api_info(State(state): State<Arc<ServerState>>) -> Json<ServerMetadata> {
    Json(ServerMetadata {
        name: "ocrd",
        version: env!("CARGO_PKG_VERSION"),
        language: state.config.ocr.language.to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
