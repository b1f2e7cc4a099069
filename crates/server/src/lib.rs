//! ocrd server - HTTP front end for base64 image OCR
//!
//! One recognition route backed by a single engine handle:
//!
//! - `POST /ocr` - `{ "image": "data:image/png;base64,..." }` →
//!   `{ "success": true, "data": { "text": "..." } }`
//!
//! Plus operational endpoints:
//!
//! - `GET /` - Service information
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe (engine phase, failure cause)
//! - `GET /metrics` - Prometheus metrics
//!
//! Failures use `{ "success": false, "error": "..." }` with 400 for bad
//! input, 503 while the engine is not ready and 500 for engine errors.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, serve, start_server};
pub use state::ServerState;
