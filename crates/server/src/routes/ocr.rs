use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use ocrd::DataUri;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Body of `POST /ocr`. Any other field is ignored.
///
/// `image` is kept as raw JSON: `null`, `false`, `0` and `""` all count as
/// "no image", any other non-string is an invalid format.
#[derive(Debug, Default, Deserialize)]
pub struct OcrRequest {
    #[serde(default)]
    pub image: Option<Value>,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OcrResponse {
    pub success: bool,
    pub data: OcrData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OcrData {
    pub text: String,
}

/// Recognize text in a base64 data URI image.
///
/// Checks run in order and stop at the first failure:
/// 1. `image` missing or empty → 400 `No image provided`
/// 2. not `data:image/{png|jpeg|jpg|gif};base64,...` → 400 invalid format
/// 3. engine not ready → 503, client should retry
/// 4. engine failure → 500 with a generic message; the cause is only logged
///
/// # Example
/// ```json
/// // Request
/// { "image": "data:image/png;base64,iVBORw0KGgo..." }
///
/// // Response
/// { "success": true, "data": { "text": "Bonjour le monde" } }
/// ```
pub async fn recognize(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<OcrRequest>, JsonRejection>,
) -> ServerResult<Json<OcrResponse>> {
    let result = run(&state, payload).await;

    let outcome = match &result {
        Ok(_) => "success",
        Err(err) => err.outcome(),
    };
    metrics::counter!("ocr_requests_total", "outcome" => outcome).increment(1);

    result
}

async fn run(
    state: &ServerState,
    payload: Result<Json<OcrRequest>, JsonRejection>,
) -> ServerResult<Json<OcrResponse>> {
    let Json(request) = payload?;

    let image = match request.image {
        Some(image) if !is_blank(&image) => image,
        _ => return Err(ServerError::NoImage),
    };
    let Value::String(image) = image else {
        return Err(ServerError::InvalidImageFormat);
    };
    let image = DataUri::parse(image).map_err(|_| ServerError::InvalidImageFormat)?;

    if !state.engine.is_ready() {
        tracing::debug!(phase = %state.engine.phase(), "rejecting OCR request, engine not ready");
        return Err(ServerError::NotReady);
    }

    let started = Instant::now();
    let recognition = state.engine.recognize(image).await?;
    metrics::histogram!("ocr_recognition_duration_seconds").record(started.elapsed().as_secs_f64());

    Ok(Json(OcrResponse {
        success: true,
        data: OcrData {
            text: recognition.trimmed().to_string(),
        },
    }))
}
