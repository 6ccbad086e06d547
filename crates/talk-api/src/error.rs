//! Error types for the talk API client.

use thiserror::Error;

/// Failures below the protocol level. Never retried.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection, TLS, or body read failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request body could not be encoded
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Endpoint URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Result type alias using TransportError.
pub type TransportResult<T> = Result<T, TransportError>;
