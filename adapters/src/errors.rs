//! Custom error types specific to the `adapters` crate.
//!
//! This module defines errors that can occur while connecting to an event
//! source, speaking its wire protocol, or validating inbound payloads.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    #[error("invalid event source url: {0}")]
    InvalidUrl(String),
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("handshake failed: {0}")]
    HandshakeError(String),
    #[error("protocol error: {0}")]
    ProtocolError(String),
    #[error("malformed event: {0}")]
    ValidationError(String),
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
    #[error("event source closed: {0}")]
    Closed(String),
}

impl AdapterError {
    /// Whether the error ends the subscription it was raised on.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AdapterError::ValidationError(_))
    }
}
