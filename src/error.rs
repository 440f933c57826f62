//! Error types shared across the library.
//!
//! Lookup failures inside the session store have no variant here; they are
//! logged and absorbed where they happen.

use reqwest::StatusCode;

/// Result type for ytsub operations
pub type Result<T> = std::result::Result<T, YtSubError>;

/// Error types for ytsub operations
#[derive(thiserror::Error, Debug)]
pub enum YtSubError {
    #[error("Invalid YouTube video ID or URL: {0}")]
    InvalidVideoId(String),

    #[error("Invalid time value: {0}")]
    InvalidTime(String),

    #[error("Captions service returned {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Upstream {
        status: StatusCode,
        detail: Option<String>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl YtSubError {
    /// Message suitable for showing to the person using the editor.
    pub fn user_message(&self) -> String {
        match self {
            YtSubError::InvalidVideoId(_) => "Invalid YouTube URL or video ID.".to_string(),
            YtSubError::InvalidTime(value) => {
                format!("'{}' is not a valid time. Use HH:MM:SS.mmm.", value)
            }
            YtSubError::Upstream { status, detail } => message_for_status(*status, detail.as_deref()),
            YtSubError::Timeout(_) => "The request timed out. Please try again.".to_string(),
            YtSubError::Network(e) if e.is_timeout() => {
                "The request timed out. Please try again.".to_string()
            }
            YtSubError::Network(_) => {
                "Could not reach the captions service. Check your connection.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether another attempt at the same request could succeed.
    ///
    /// Authentication failures and missing videos never change on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            YtSubError::Upstream { status, .. } => {
                !matches!(*status, StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND)
            }
            YtSubError::Network(_) | YtSubError::Timeout(_) => true,
            _ => false,
        }
    }
}

fn message_for_status(status: StatusCode, detail: Option<&str>) -> String {
    match status.as_u16() {
        400 => detail
            .unwrap_or("Invalid YouTube URL or video ID.")
            .to_string(),
        401 => "API authentication failed. Check your API key.".to_string(),
        404 => detail
            .unwrap_or("The video could not be found or has no captions.")
            .to_string(),
        429 => "Too many requests. Please wait a moment and try again.".to_string(),
        504 => "The request timed out. Please try again.".to_string(),
        _ => detail.unwrap_or("An unknown error occurred.").to_string(),
    }
}
