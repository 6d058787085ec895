//! Error handling for cookies-export

use thiserror::Error;

/// Main error type for cookie export operations
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Browser cookie error: {0}")]
    BrowserCookie(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Async runtime error: {0}")]
    Runtime(String),
}

/// Result type alias for cookie export operations
pub type Result<T> = std::result::Result<T, ExportError>;
