//! Error types shared across the client modules.

use std::io;
use thiserror::Error;

/// Failures of the local key-value store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode store: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures of history operations that can be reported to the user.
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Invalid file: expected an array of history items")]
    NotAList,

    #[error("Invalid history item at position {index}: {reason}")]
    InvalidEntry { index: usize, reason: String },

    #[error("Invalid file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Failures on the download path.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("No text detected in the input")]
    EmptyText,

    #[error("A download is already in progress")]
    InProgress,

    #[error("Relay returned HTTP {status}: {body}")]
    RelayStatus { status: u16, body: String },

    #[error("Relay returned an empty audio file")]
    EmptyAudio,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Could not build relay URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to save audio: {0}")]
    Save(#[from] io::Error),
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        DownloadError::Transport(e.to_string())
    }
}

/// Failures of on-device speech preview.
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("On-device speech synthesis is not available ({0})")]
    Unavailable(String),

    #[error("Speech engine error: {0}")]
    Engine(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failures while sharing a link.
#[derive(Error, Debug)]
pub enum ShareError {
    #[error("Invalid share URL: {0}")]
    InvalidUrl(String),

    #[error("Clipboard unavailable: {0}")]
    Clipboard(String),
}
