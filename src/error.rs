//! Error types for PDF source resolution

use thiserror::Error;

/// Result type alias for PDF source resolution
pub type Result<T> = std::result::Result<T, Error>;

/// Message reported to the host for any acquisition failure without a status code
const LOAD_FAILED: &str = "load pdf failed.";

/// Error types for PDF source resolution
#[derive(Error, Debug)]
pub enum Error {
    /// No source URI was supplied
    #[error("no pdf source")]
    MissingSource,

    /// Bundled asset could not be located
    #[error("Bundled asset not found: {name}")]
    AssetNotFound { name: String },

    /// Bundled asset name escapes the asset root
    #[error("Asset access denied: {name}")]
    AssetAccessDenied { name: String },

    /// Server answered with a status outside the success class
    #[error("load pdf failed with code {status}")]
    HttpStatus { status: u16 },

    /// Request method is not a valid HTTP token
    #[error("Invalid request method: {method}")]
    InvalidMethod { method: String },

    /// Request header name or value is malformed
    #[error("Invalid request header: {name}")]
    InvalidHeader { name: String },

    /// Network URI could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Resolution was superseded or torn down
    #[error("Transfer cancelled")]
    Cancelled,
}

impl Error {
    /// Return the message handed to the host's error callback.
    /// Internal details (paths, library errors) are omitted; full details
    /// should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::HttpStatus { status } => format!("load pdf failed with code {}", status),
            Error::MissingSource => "no pdf source".to_string(),
            _ => LOAD_FAILED.to_string(),
        }
    }

    /// Whether this error is a cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
