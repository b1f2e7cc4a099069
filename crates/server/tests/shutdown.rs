//! End-to-end serve/shutdown over a real socket.

use async_trait::async_trait;
use ocrd::{
    DataUri, EngineHandle, EngineLoader, EnginePhase, LanguageProfile, OcrConfig, OcrEngine,
    OcrError, Recognition,
};
use serde_json::{json, Value};
use server::{ServerConfig, ServerState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct FlagEngine {
    released: Arc<AtomicBool>,
}

#[async_trait]
impl OcrEngine for FlagEngine {
    fn name(&self) -> &'static str {
        "flag"
    }

    async fn recognize(&self, _image: &DataUri) -> Result<Recognition, OcrError> {
        Ok(Recognition::new(" Bonjour le monde "))
    }

    async fn terminate(&self) -> Result<(), OcrError> {
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct FlagLoader {
    released: Arc<AtomicBool>,
}

#[async_trait]
impl EngineLoader for FlagLoader {
    async fn load(&self, _: &LanguageProfile) -> Result<Box<dyn OcrEngine>, OcrError> {
        Ok(Box::new(FlagEngine {
            released: self.released.clone(),
        }))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_terminates_engine_then_closes_listener() {
    let released = Arc::new(AtomicBool::new(false));
    let config = ServerConfig {
        ocr: OcrConfig {
            shutdown_timeout: Duration::from_secs(2),
            ..Default::default()
        },
        ..Default::default()
    };
    let engine = EngineHandle::spawn(
        FlagLoader {
            released: released.clone(),
        },
        config.ocr.clone(),
    );
    engine.wait_ready().await;
    let state = Arc::new(ServerState::new(config, engine.clone()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(server::serve(listener, state, async move {
        let _ = stop_rx.await;
    }));

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();
    let response = client
        .post(format!("http://{addr}/ocr"))
        .json(&json!({ "image": "data:image/jpg;base64,AAAA" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["text"], "Bonjour le monde");

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not shut down")
        .unwrap()
        .unwrap();

    assert_eq!(engine.phase(), EnginePhase::Terminated);
    assert!(released.load(Ordering::SeqCst));

    let after = client.get(format!("http://{addr}/health")).send().await;
    assert!(after.is_err(), "listener should be closed");
}

#[tokio::test]
async fn bind_failure_is_reported() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = taken.local_addr().unwrap();

    assert!(server::server::bind(addr).await.is_err());
}
