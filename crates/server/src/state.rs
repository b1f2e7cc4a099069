use crate::config::ServerConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use ocrd::EngineHandle;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// The process-wide engine handle. Only the shutdown path terminates it.
    pub engine: EngineHandle,

    /// Renders `/metrics` when a Prometheus recorder is installed
    pub metrics: Option<PrometheusHandle>,

    pub started_at: Instant,
}

impl ServerState {
    /// Create new server state around an already spawned engine handle
    pub fn new(config: ServerConfig, engine: EngineHandle) -> Self {
        Self {
            config: Arc::new(config),
            engine,
            metrics: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Server metadata for the info endpoint
#[derive(Debug, serde::Serialize)]
pub struct ServerMetadata {
    pub name: &'static str,
    pub version: &'static str,
    pub language: String,
    pub uptime_seconds: u64,
}
