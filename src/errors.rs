use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdaterError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Manifest body is empty")]
    EmptyManifest,
    #[error("Unsafe path: {0}")]
    UnsafePath(String),
    #[error("Stalled: no new bytes for {idle:?} (limit {limit:?}) after {downloaded} bytes")]
    Stalled {
        idle: Duration,
        limit: Duration,
        downloaded: u64,
    },
    #[error("Timed out after {budget:?} with {downloaded} bytes received")]
    TimedOut { budget: Duration, downloaded: u64 },
    #[error("Size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("Missing .part file: {0}")]
    MissingPart(PathBuf),
    #[error("Destination is a directory: {0}")]
    DestinationIsDirectory(PathBuf),
    #[error("Insufficient storage: need {required} bytes, {available} available")]
    InsufficientStorage { required: u64, available: u64 },
    #[error("Config error: {0}")]
    Config(String),
    #[error("Worker error: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, UpdaterError>;
