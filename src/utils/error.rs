//! Error types for the relay.
//!
//! Only listener and configuration failures ever reach `main`. Everything
//! else is scoped to the single connection it happened on: the connection
//! task logs it and the connection closes.

use std::io;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error("no frame received for {0:?}")]
    IdleTimeout(std::time::Duration),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("request head exceeds {0} bytes")]
    HeadTooLarge(usize),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
}

impl RelayError {
    /// Errors that mean the peer sent something other than a well-formed
    /// upgrade. Those still get the plain-text status response.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::HeadTooLarge(_) | Self::MalformedRequest(_))
    }
}
