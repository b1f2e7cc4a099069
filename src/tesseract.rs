//! Tesseract backend.
//!
//! Drives the `tesseract` binary through rusty-tesseract. Incoming images are
//! decoded with the `image` crate first, so png/jpeg/gif all reach tesseract
//! as a normalized PNG regardless of how leptonica was built.

use async_trait::async_trait;
use bytes::Bytes;
use image::ImageFormat;
use rusty_tesseract::{Args, Image};
use std::collections::HashMap;

use crate::config::TesseractConfig;
use crate::data_uri::DataUri;
use crate::engine::{EngineLoader, LanguageProfile, OcrEngine, Recognition};
use crate::error::OcrError;

/// Builds [`TesseractEngine`]s after checking the binary and language data.
#[derive(Debug, Clone, Default)]
pub struct TesseractLoader {
    config: TesseractConfig,
}

impl TesseractLoader {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineLoader for TesseractLoader {
    async fn load(&self, language: &LanguageProfile) -> Result<Box<dyn OcrEngine>, OcrError> {
        let language = language.clone();
        let config = self.config.clone();
        let engine = tokio::task::spawn_blocking(move || TesseractEngine::probe(language, config))
            .await
            .map_err(|e| OcrError::Init(format!("probe task failed: {e}")))??;
        Ok(Box::new(engine))
    }
}

/// One tesseract configuration bound to a language profile.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    language: LanguageProfile,
    config: TesseractConfig,
}

impl TesseractEngine {
    /// Verify the binary runs and every requested language is installed.
    fn probe(language: LanguageProfile, config: TesseractConfig) -> Result<Self, OcrError> {
        let version = rusty_tesseract::get_tesseract_version()
            .map_err(|e| OcrError::Init(format!("tesseract binary unavailable: {e}")))?;

        let installed = rusty_tesseract::get_tesseract_langs()
            .map_err(|e| OcrError::Init(format!("cannot list tesseract languages: {e}")))?;
        if let Some(missing) = language
            .codes()
            .find(|code| !installed.iter().any(|l| l == code))
        {
            return Err(OcrError::Language(format!(
                "`{missing}` is not installed (available: {})",
                installed.join(", ")
            )));
        }

        tracing::info!(
            version = %version.lines().next().unwrap_or_default(),
            language = %language,
            "tesseract engine ready"
        );
        Ok(Self { language, config })
    }

    fn args(&self) -> Args {
        Args {
            lang: self.language.as_str().to_string(),
            config_variables: HashMap::new(),
            dpi: self.config.dpi,
            psm: self.config.psm,
            oem: self.config.oem,
        }
    }

    fn recognize_blocking(&self, bytes: Bytes) -> Result<Recognition, OcrError> {
        let decoded =
            image::load_from_memory(&bytes).map_err(|e| OcrError::Image(e.to_string()))?;

        let file = tempfile::Builder::new()
            .prefix("ocrd-")
            .suffix(".png")
            .tempfile()?;
        decoded
            .save_with_format(file.path(), ImageFormat::Png)
            .map_err(|e| OcrError::Image(e.to_string()))?;

        let image = Image::from_path(file.path().to_path_buf())
            .map_err(|e| OcrError::Recognition(e.to_string()))?;
        let text = rusty_tesseract::image_to_string(&image, &self.args())
            .map_err(|e| OcrError::Recognition(e.to_string()))?;

        Ok(Recognition::new(text))
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn recognize(&self, image: &DataUri) -> Result<Recognition, OcrError> {
        let bytes = image.decode()?;
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.recognize_blocking(bytes))
            .await
            .map_err(|e| OcrError::Recognition(format!("recognition task failed: {e}")))?
    }

    async fn terminate(&self) -> Result<(), OcrError> {
        tracing::debug!(language = %self.language, "tesseract engine released");
        Ok(())
    }
}
