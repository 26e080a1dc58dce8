//! Error types for uartlink
//!
//! Only two conditions are fatal to a session: a missing transport adapter and
//! use of a runtime after teardown. Everything else is converted into an
//! `Info` session record by the runtime and never leaves the dispatch loop.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Errors reported synchronously by a transport command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Transport is not bound")]
    NotBound,
    #[error("Transport command {command} failed: {reason}")]
    CommandFailed {
        command: &'static str,
        reason: String,
    },
}

/// Errors from durable storage (peer directory, transcript)
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage serialization error: {reason}")]
    Serialization { reason: String },
    #[error("Stored data is corrupt: {reason}")]
    Corrupt { reason: String },
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum UartError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("No transport adapter is available")]
    TransportMissing,

    #[error("Invalid peer id: {input:?}")]
    InvalidPeerId { input: String },

    #[error("Runtime has shut down")]
    Shutdown,
}

pub type UartResult<T> = std::result::Result<T, UartError>;
