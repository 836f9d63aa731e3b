//! # Service Errors
//!
//! Failure taxonomy shared by the chat backend, the pipeline stages and the
//! recipe-search client.

use thiserror::Error;

/// Errors raised while talking to an external service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The backend answered with a non-success HTTP status.
    #[error("upstream request failed with status {status}: {body}")]
    UpstreamRequest { status: u16, body: String },

    /// The backend answered successfully but the payload could not be decoded.
    /// `raw` holds the offending text so it can be written to a debug artifact.
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String, raw: String },

    /// Required settings are missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Raw backend text attached to a malformed response, if any.
    pub fn raw_payload(&self) -> Option<&str> {
        match self {
            ServiceError::MalformedResponse { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// HTTP status carried by an upstream failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::UpstreamRequest { status, .. } => Some(*status),
            ServiceError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
