//! # Errors
//!
//! This module defines the error types shared by collections, records and transports.
//! Every I/O failure reaches the caller through the `Result` of the async operation
//! that caused it; expected conditions (empty collection, removing an absent record,
//! `index_of` misses) are never errors.

use std::fmt;

/// Result alias used throughout the crate.
pub type RestResult<T> = Result<T, RestError>;

/// Failure reported by a [`Transport`](crate::transport::Transport).
///
/// `status` carries the HTTP-like status code when the remote side answered,
/// and is `None` when the request never produced a response (connection lost,
/// server task gone).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub status: Option<u16>,
    pub reason: String,
}

impl TransportError {
    /// The remote side answered with a non-2xx status.
    pub fn status(code: u16, reason: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            reason: reason.into(),
        }
    }

    /// The request failed before any response arrived.
    pub fn network(reason: impl Into<String>) -> Self {
        Self {
            status: None,
            reason: reason.into(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self.status, Some(400..=499))
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self.status, Some(500..=599))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "{} {}", code, self.reason),
            None => write!(f, "{}", self.reason),
        }
    }
}

impl std::error::Error for TransportError {}

/// Errors surfaced by collection and record operations.
///
/// The enum is `Clone` because a single failed fetch cycle is observed by every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RestError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The payload could not be decoded into the model's typed attributes.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A packer returned something other than the documented shape.
    #[error("Packer contract violation: {0}")]
    PackerContract(String),

    /// The record has no primary key yet.
    #[error("Record is not persisted")]
    NotPersisted,

    #[error("Unknown event: {0}")]
    UnknownEvent(String),
}

impl From<serde_json::Error> for RestError {
    fn from(e: serde_json::Error) -> Self {
        RestError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_classification() {
        assert!(TransportError::status(404, "Not Found").is_client_error());
        assert!(TransportError::status(503, "Unavailable").is_server_error());
        assert!(!TransportError::network("connection reset").is_client_error());
        assert!(!TransportError::network("connection reset").is_server_error());
    }

    #[test]
    fn error_display() {
        let err = RestError::from(TransportError::status(500, "Internal Server Error"));
        assert_eq!(err.to_string(), "Transport error: 500 Internal Server Error");

        let err = RestError::from(TransportError::network("server gone"));
        assert_eq!(err.to_string(), "Transport error: server gone");
    }
}
