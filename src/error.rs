use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the engine handle and its backends.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The input does not start with an accepted `data:image/...;base64,` prefix.
    #[error("image is not a base64 data URI with a png, jpeg, jpg or gif media type")]
    InvalidDataUri,
    /// The base64 payload after the data URI prefix could not be decoded.
    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
    /// The decoded bytes are not an image the backend can read.
    #[error("unreadable image: {0}")]
    Image(String),
    /// Language profile is malformed or not installed for the backend.
    #[error("language profile unavailable: {0}")]
    Language(String),
    /// Engine construction failed.
    #[error("engine initialization failed: {0}")]
    Init(String),
    /// The engine ran but failed to produce text.
    #[error("recognition failed: {0}")]
    Recognition(String),
    /// The handle is not in the ready phase.
    #[error("engine is not ready")]
    NotReady,
    /// The worker owning the engine went away before replying.
    #[error("engine worker stopped before replying")]
    WorkerGone,
    /// Engine teardown exceeded the configured shutdown timeout.
    #[error("engine termination timed out after {0:?}")]
    TerminateTimeout(Duration),
    /// Configuration is inconsistent.
    #[error("invalid ocr config: {0}")]
    InvalidConfig(String),
    /// Low-level IO failures (temp files, blocking task joins).
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
