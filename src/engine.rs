//! The OCR engine capability.
//!
//! Engines are opaque: the handle only needs to build one for a language
//! profile, ask it for text, and tear it down. Backends implement
//! [`EngineLoader`] and [`OcrEngine`]; everything about image decoding and
//! recognition stays on their side of the seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::data_uri::DataUri;
use crate::error::OcrError;

/// Text produced by one recognition call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recognition {
    pub text: String,
}

impl Recognition {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Text with leading and trailing whitespace removed; inner spacing kept.
    pub fn trimmed(&self) -> &str {
        self.text.trim()
    }
}

/// `+`-joined language codes, e.g. `fra` or `fra+eng`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageProfile(String);

impl LanguageProfile {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.0.split('+')
    }
}

impl Default for LanguageProfile {
    fn default() -> Self {
        LanguageProfile("fra".to_string())
    }
}

impl FromStr for LanguageProfile {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(OcrError::Language("empty language profile".into()));
        }
        for code in s.split('+') {
            let valid = !code.is_empty()
                && code
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !valid {
                return Err(OcrError::Language(format!(
                    "invalid language code {code:?} in {s:?}"
                )));
            }
        }
        Ok(LanguageProfile(s.to_string()))
    }
}

impl TryFrom<String> for LanguageProfile {
    type Error = OcrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LanguageProfile> for String {
    fn from(value: LanguageProfile) -> Self {
        value.0
    }
}

impl fmt::Display for LanguageProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A live engine instance.
///
/// The handle gives each instance to exactly one worker, so implementations
/// never see concurrent `recognize` calls on the same value.
#[async_trait]
pub trait OcrEngine: Send + Sync + 'static {
    /// Backend identifier for logs, e.g. `"tesseract"`.
    fn name(&self) -> &'static str;

    async fn recognize(&self, image: &DataUri) -> Result<Recognition, OcrError>;

    /// Release backend resources. Called once, after the last `recognize`.
    async fn terminate(&self) -> Result<(), OcrError> {
        Ok(())
    }
}

/// Builds engine instances for a language profile.
#[async_trait]
pub trait EngineLoader: Send + Sync + 'static {
    async fn load(&self, language: &LanguageProfile) -> Result<Box<dyn OcrEngine>, OcrError>;
}
