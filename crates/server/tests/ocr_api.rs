//! HTTP contract tests for `POST /ocr` and the operational endpoints.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`; engines
//! are scripted fakes so no tesseract install is needed.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use ocrd::{
    DataUri, EngineHandle, EngineLoader, EnginePhase, LanguageProfile, OcrConfig, OcrEngine,
    OcrError, Recognition, RetryConfig,
};
use serde_json::{json, Value};
use server::{build_router, ServerConfig, ServerState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tower::ServiceExt;

const HELLO: &str = "data:image/png;base64,SGVsbG8=";
const FAILING: &str = "data:image/png;base64,ZmFpbA==";

/// `SGVsbG8=` reads as padded "Hello World", `ZmFpbA==` fails with an
/// internal-looking message, anything else echoes its payload.
struct ScriptedEngine;

#[async_trait]
impl OcrEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn recognize(&self, image: &DataUri) -> Result<Recognition, OcrError> {
        tokio::task::yield_now().await;
        match image.payload() {
            "SGVsbG8=" => Ok(Recognition::new("  Hello World  ")),
            "ZmFpbA==" => Err(OcrError::Recognition(
                "tesseract: /tmp/ocrd-secret.png could not be read".into(),
            )),
            other => Ok(Recognition::new(format!("\n{other}\n"))),
        }
    }
}

#[derive(Default)]
struct ScriptedLoader {
    gate: Option<Arc<Notify>>,
    fail: bool,
}

#[async_trait]
impl EngineLoader for ScriptedLoader {
    async fn load(&self, language: &LanguageProfile) -> Result<Box<dyn OcrEngine>, OcrError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(OcrError::Language(format!("`{language}` is not installed")));
        }
        Ok(Box::new(ScriptedEngine))
    }
}

fn test_config() -> ServerConfig {
    ServerConfig {
        max_body_size_mb: 1,
        ocr: OcrConfig {
            retry: RetryConfig::default()
                .with_max_retries(0)
                .with_base_delay(Duration::from_millis(1)),
            shutdown_timeout: Duration::from_secs(2),
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn state_with(loader: ScriptedLoader) -> Arc<ServerState> {
    let config = test_config();
    let engine = EngineHandle::spawn(loader, config.ocr.clone());
    Arc::new(ServerState::new(config, engine))
}

async fn ready_app() -> (Router, Arc<ServerState>) {
    let state = state_with(ScriptedLoader::default()).await;
    assert_eq!(state.engine.wait_ready().await, EnginePhase::Ready);
    (build_router(state.clone()), state)
}

async fn post_ocr(app: &Router, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/ocr")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

#[tokio::test]
async fn missing_or_empty_image_is_rejected() {
    let (app, _) = ready_app().await;

    for body in [
        json!({}),
        json!({ "image": "" }),
        json!({ "image": null }),
        json!({ "image": false }),
        json!({ "image": 0 }),
    ] {
        let (status, json) = post_ocr(&app, body.to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(
            json,
            json!({ "success": false, "error": "No image provided" })
        );
    }
}

#[tokio::test]
async fn malformed_data_uri_is_rejected() {
    let (app, _) = ready_app().await;

    for image in [
        "hello",
        "data:image/webp;base64,AAAA",
        "data:image/PNG;base64,AAAA",
        "data:image/png,AAAA",
        "iVBORw0KGgoAAAANSUhEUgAAAAEAAAAB",
    ] {
        let (status, json) = post_ocr(&app, json!({ "image": image }).to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{image}");
        assert_eq!(json["success"], false);
        assert_eq!(
            json["error"],
            "Invalid image format. Must be base64 encoded image with data URI scheme"
        );
    }
}

#[tokio::test]
async fn not_ready_engine_answers_503() {
    let gate = Arc::new(Notify::new());
    let state = state_with(ScriptedLoader {
        gate: Some(gate.clone()),
        ..Default::default()
    })
    .await;
    let app = build_router(state.clone());

    let (status, json) = post_ocr(&app, json!({ "image": HELLO }).to_string()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        json,
        json!({
            "success": false,
            "error": "OCR service is initializing. Please try again in a few seconds"
        })
    );

    // Input validation still runs first.
    let (status, _) = post_ocr(&app, json!({ "image": "hello" }).to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    gate.notify_one();
    state.engine.wait_ready().await;
    let (status, _) = post_ocr(&app, json!({ "image": HELLO }).to_string()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn failed_initialization_stays_unavailable() {
    let state = state_with(ScriptedLoader {
        fail: true,
        ..Default::default()
    })
    .await;
    let phase = state.engine.wait_ready().await;
    assert!(phase.failure().is_some());
    let app = build_router(state);

    let (status, _) = post_ocr(&app, json!({ "image": HELLO }).to_string()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, json) = get(&app, "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["components"]["engine"]["phase"], "failed");
    assert!(json["components"]["engine"]["cause"]
        .as_str()
        .unwrap()
        .contains("not installed"));
}

#[tokio::test]
async fn recognized_text_is_trimmed() {
    let (app, _) = ready_app().await;

    let (status, json) = post_ocr(&app, json!({ "image": HELLO }).to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({ "success": true, "data": { "text": "Hello World" } })
    );
}

#[tokio::test]
async fn extra_fields_are_ignored() {
    let (app, _) = ready_app().await;

    let body = json!({ "image": HELLO, "language": "eng", "foo": [1, 2] });
    let (status, json) = post_ocr(&app, body.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["text"], "Hello World");
}

#[tokio::test]
async fn engine_failure_is_generic_500() {
    let (app, _) = ready_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/ocr")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "image": FAILING }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let raw = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!raw.contains("ocrd-secret"));
    assert!(!raw.contains("tesseract"));
    let json: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(
        json,
        json!({ "success": false, "error": "Error processing image" })
    );
}

#[tokio::test]
async fn undecodable_payload_is_processing_error_not_validation_error() {
    let state = {
        let config = test_config();
        struct DecodingEngine;
        #[async_trait]
        impl OcrEngine for DecodingEngine {
            fn name(&self) -> &'static str {
                "decoding"
            }
            async fn recognize(&self, image: &DataUri) -> Result<Recognition, OcrError> {
                let bytes = image.decode()?;
                Ok(Recognition::new(format!("{} bytes", bytes.len())))
            }
        }
        struct DecodingLoader;
        #[async_trait]
        impl EngineLoader for DecodingLoader {
            async fn load(&self, _: &LanguageProfile) -> Result<Box<dyn OcrEngine>, OcrError> {
                Ok(Box::new(DecodingEngine))
            }
        }
        let engine = EngineHandle::spawn(DecodingLoader, config.ocr.clone());
        engine.wait_ready().await;
        Arc::new(ServerState::new(config, engine))
    };
    let app = build_router(state);

    let (status, json) = post_ocr(
        &app,
        json!({ "image": "data:image/jpeg;base64,***" }).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Error processing image");
}

#[tokio::test]
async fn repeated_requests_are_independent() {
    let (app, _) = ready_app().await;

    let body = json!({ "image": HELLO }).to_string();
    let first = post_ocr(&app, body.clone()).await;
    let second = post_ocr(&app, body).await;

    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);
    assert_eq!(first.1, second.1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_get_their_own_results() {
    let (app, _) = ready_app().await;

    let calls = (0..24).map(|i| {
        let app = app.clone();
        tokio::spawn(async move {
            let payload = format!("cmVxdWVzdC0{i:02}");
            let body = json!({ "image": format!("data:image/gif;base64,{payload}") });
            let (status, json) = post_ocr(&app, body.to_string()).await;
            (payload, status, json)
        })
    });

    for joined in futures::future::join_all(calls).await {
        let (payload, status, json) = joined.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["text"], payload);
    }
}

#[tokio::test]
async fn malformed_json_uses_error_envelope() {
    let (app, _) = ready_app().await;

    let (status, json) = post_ocr(&app, "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().starts_with("Bad request"));

}

#[tokio::test]
async fn non_string_image_is_invalid_format() {
    let (app, _) = ready_app().await;

    for image in [json!(42), json!(true), json!({ "data": HELLO }), json!([HELLO])] {
        let (status, json) = post_ocr(&app, json!({ "image": image }).to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{image}");
        assert_eq!(
            json["error"],
            "Invalid image format. Must be base64 encoded image with data URI scheme"
        );
    }
}

#[tokio::test]
async fn oversized_body_is_413() {
    let (app, _) = ready_app().await;

    let payload = "A".repeat(2 * 1024 * 1024);
    let body = json!({ "image": format!("data:image/png;base64,{payload}") }).to_string();
    let (status, json) = post_ocr(&app, body).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn terminated_engine_answers_503() {
    let (app, state) = ready_app().await;

    state.engine.terminate().await.unwrap();
    let (status, _) = post_ocr(&app, json!({ "image": HELLO }).to_string()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn operational_endpoints() {
    let (app, _) = ready_app().await;

    let (status, json) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");

    let (status, json) = get(&app, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["components"]["engine"]["phase"], "ready");
    assert_eq!(json["components"]["engine"]["language"], "fra");

    let (status, json) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "ocrd");

    // No recorder installed in tests.
    let (status, _) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = get(&app, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json, json!({ "success": false, "error": "Not found" }));
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let (app, _) = ready_app().await;

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);
}
