//! Gateway error normalization

use thiserror::Error;

/// Errors surfaced by cluster API calls
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The cluster could not be reached
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The cluster rejected the request (HTTP status >= 400)
    #[error("cluster rejected the request ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Authentication was rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The response body did not match the expected envelope
    #[error("unexpected response payload: {0}")]
    Parse(String),
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
