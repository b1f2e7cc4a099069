use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::engine::LanguageProfile;
use crate::error::OcrError;
use crate::retry::RetryConfig;

/// Engine handle configuration.
///
/// # Example
/// ```
/// use ocrd::OcrConfig;
///
/// let cfg = OcrConfig {
///     language: "fra+eng".parse().unwrap(),
///     workers: 2,
///     ..Default::default()
/// };
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OcrConfig {
    /// Recognition language profile, `+`-joined locale codes.
    pub language: LanguageProfile,
    /// Engine instances, each owned by one worker loop.
    pub workers: usize,
    /// Recognition jobs that may wait for a free worker.
    pub queue_capacity: usize,
    /// Upper bound on engine teardown during shutdown, in milliseconds.
    #[serde(with = "crate::serde_millis")]
    pub shutdown_timeout: Duration,
    /// Backoff for engine initialization.
    pub retry: RetryConfig,
    pub tesseract: TesseractConfig,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: LanguageProfile::default(),
            workers: 1,
            queue_capacity: 64,
            shutdown_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            tesseract: TesseractConfig::default(),
        }
    }
}

impl OcrConfig {
    pub fn validate(&self) -> Result<(), OcrError> {
        if self.workers == 0 {
            return Err(OcrError::InvalidConfig("workers must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(OcrError::InvalidConfig(
                "queue_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Options passed to the tesseract binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TesseractConfig {
    pub dpi: Option<i32>,
    /// Page segmentation mode (`--psm`).
    pub psm: Option<i32>,
    /// OCR engine mode (`--oem`).
    pub oem: Option<i32>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            dpi: Some(150),
            psm: Some(3),
            oem: Some(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_values() {
        let cfg = OcrConfig::default();
        assert_eq!(cfg.language.as_str(), "fra");
        assert_eq!(cfg.workers, 1);
        assert_eq!(cfg.queue_capacity, 64);
        assert_eq!(cfg.shutdown_timeout, Duration::from_secs(10));
        assert_eq!(cfg.tesseract.psm, Some(3));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_workers_rejected() {
        let cfg = OcrConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(OcrError::InvalidConfig(_))));
    }

    #[test]
    fn zero_capacity_rejected() {
        let cfg = OcrConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: OcrConfig =
            serde_json::from_str(r#"{"language":"eng","shutdown_timeout":2500}"#).unwrap();
        assert_eq!(cfg.language.as_str(), "eng");
        assert_eq!(cfg.shutdown_timeout, Duration::from_millis(2500));
        assert_eq!(cfg.workers, 1);
    }

    #[test]
    fn bad_language_rejected_on_deserialize() {
        let parsed: Result<OcrConfig, _> = serde_json::from_str(r#"{"language":"fra++eng"}"#);
        assert!(parsed.is_err());
    }
}
