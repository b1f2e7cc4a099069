//! OCR engine handle for the `ocrd` service.
//!
//! This crate owns everything below the HTTP layer:
//!
//! - [`DataUri`]: validation of `data:image/{png|jpeg|jpg|gif};base64,` inputs
//! - [`OcrEngine`] / [`EngineLoader`]: the opaque engine capability
//! - [`EngineHandle`]: background initialization, readiness, a serialized work
//!   queue and bounded termination
//! - [`TesseractLoader`]: the default backend (feature `tesseract`)
//!
//! ```no_run
//! use ocrd::{DataUri, EngineHandle, OcrConfig, TesseractLoader};
//!
//! # async fn run() -> Result<(), ocrd::OcrError> {
//! let config = OcrConfig::default();
//! let handle = EngineHandle::spawn(TesseractLoader::new(config.tesseract.clone()), config);
//! handle.wait_ready().await;
//!
//! let image = DataUri::parse("data:image/png;base64,iVBORw0KGgo...")?;
//! let text = handle.recognize(image).await?;
//! println!("{}", text.trimmed());
//!
//! handle.terminate().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data_uri;
pub mod engine;
pub mod error;
pub mod handle;
pub mod retry;
mod serde_millis;
#[cfg(feature = "tesseract")]
pub mod tesseract;

pub use config::{OcrConfig, TesseractConfig};
pub use data_uri::{DataUri, ImageMime};
pub use engine::{EngineLoader, LanguageProfile, OcrEngine, Recognition};
pub use error::OcrError;
pub use handle::{EngineHandle, EnginePhase};
pub use retry::RetryConfig;
#[cfg(feature = "tesseract")]
pub use tesseract::{TesseractEngine, TesseractLoader};
