//! Base64 image data URIs.
//!
//! Only the prefix is validated here: `data:image/{png|jpeg|jpg|gif};base64,`.
//! Whatever follows is handed to the engine untouched, so a payload that is not
//! valid base64 (or not a real image) fails at recognition time.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::error::OcrError;

static DATA_URI_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:image/(png|jpeg|jpg|gif);base64,").expect("static data URI pattern")
});

// Browsers and CLI tools emit unpadded or line-wrapped payloads.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Media subtype declared in the data URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMime {
    Png,
    Jpeg,
    Jpg,
    Gif,
}

impl ImageMime {
    fn from_subtype(subtype: &str) -> Option<Self> {
        match subtype {
            "png" => Some(ImageMime::Png),
            "jpeg" => Some(ImageMime::Jpeg),
            "jpg" => Some(ImageMime::Jpg),
            "gif" => Some(ImageMime::Gif),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMime::Png => "image/png",
            ImageMime::Jpeg => "image/jpeg",
            ImageMime::Jpg => "image/jpg",
            ImageMime::Gif => "image/gif",
        }
    }
}

impl fmt::Display for ImageMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated `data:image/...;base64,` string.
#[derive(Clone, PartialEq, Eq)]
pub struct DataUri {
    raw: String,
    mime: ImageMime,
    payload_start: usize,
}

impl DataUri {
    /// Validate the prefix and keep the full string.
    pub fn parse(raw: impl Into<String>) -> Result<Self, OcrError> {
        let raw = raw.into();
        let caps = DATA_URI_PREFIX
            .captures(&raw)
            .ok_or(OcrError::InvalidDataUri)?;
        let mime = caps
            .get(1)
            .and_then(|m| ImageMime::from_subtype(m.as_str()))
            .ok_or(OcrError::InvalidDataUri)?;
        let payload_start = caps.get(0).map(|m| m.end()).ok_or(OcrError::InvalidDataUri)?;

        Ok(Self {
            raw,
            mime,
            payload_start,
        })
    }

    /// The full data URI, prefix included.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn mime(&self) -> ImageMime {
        self.mime
    }

    /// Base64 text after the comma.
    pub fn payload(&self) -> &str {
        &self.raw[self.payload_start..]
    }

    /// Decode the base64 payload into raw image bytes.
    ///
    /// Padding is optional and ASCII whitespace anywhere in the payload is
    /// ignored.
    pub fn decode(&self) -> Result<Bytes, OcrError> {
        let compact: Vec<u8> = self
            .payload()
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        let bytes = LENIENT.decode(compact)?;
        Ok(Bytes::from(bytes))
    }

    pub fn into_string(self) -> String {
        self.raw
    }
}

// Payloads run to megabytes; keep them out of logs.
impl fmt::Debug for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataUri")
            .field("mime", &self.mime)
            .field("payload_len", &self.payload().len())
            .finish()
    }
}
