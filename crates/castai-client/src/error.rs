//! CAST AI client errors

use thiserror::Error;

/// Errors that can occur when interacting with the CAST AI API
#[derive(Debug, Error)]
pub enum CastaiError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// CAST AI API returned an error
    #[error("CAST AI API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// An asynchronous operation completed with an error
    #[error("Operation failed: {0}")]
    Operation(String),
}
