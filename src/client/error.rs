// ABOUTME: Modem client error types covering validation, serial I/O and AT protocol failures
// ABOUTME: Converts codec and I/O errors automatically so operations can propagate with `?`

use crate::client::types::ValidationError;
use crate::codec::CodecError;
use std::io;
use thiserror::Error;

/// Error type for modem client operations
#[derive(Debug, Error)]
pub enum ModemError {
    /// Serial I/O failed (read, write, flush)
    #[error("Connection error: {0}")]
    Connection(#[from] io::Error),

    /// The serial port could not be opened
    #[error("Failed to open port {port}: {reason}")]
    PortOpen { port: String, reason: String },

    /// The modem did not answer the initial `AT` with `OK`
    #[error("Modem did not answer AT handshake")]
    Handshake,

    /// The modem answered `ERROR` (or a `+CMS ERROR`) to a command
    #[error("Modem rejected {command}: {response}")]
    Protocol { command: String, response: String },

    /// No `>` prompt arrived after `AT+CMGS`
    #[error("No prompt received for message")]
    NoPrompt,

    /// Operation timeout
    #[error("Timeout waiting for {waiting_for}")]
    Timeout { waiting_for: String },

    /// Request rejected before any I/O
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// PDU could not be built
    #[error("PDU encoding failed: {0}")]
    Codec(#[from] CodecError),

    /// The serial link reached end of stream
    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    /// Client not in correct state for operation
    #[error("Invalid client state: {0}")]
    InvalidState(String),
}

/// Result type alias for modem operations
pub type ModemResult<T> = Result<T, ModemError>;

impl ModemError {
    pub(crate) fn not_connected() -> Self {
        ModemError::InvalidState("Not connected".to_string())
    }
}
