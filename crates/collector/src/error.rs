use browser::BrowserError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Invalid profile URL: {0}")]
    InvalidProfileUrl(String),
    #[error("Failed to open profile page: {0}")]
    Navigation(#[source] BrowserError),
    #[error("Failed to observe page responses: {0}")]
    Interception(#[source] BrowserError),
    #[error("Collector task failed: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Response body is empty")]
    Empty,
    #[error("Failed to decode listing payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Item entry has no usable identifier")]
    MissingId,
}
