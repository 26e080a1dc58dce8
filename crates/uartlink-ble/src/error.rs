//! Error types for the BLE UART transport

use thiserror::Error;
use uartlink_core::{TransportError, UartError};

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors specific to the BLE UART transport
#[derive(Error, Debug)]
pub enum BleUartError {
    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("BLE manager error: {0}")]
    Manager(String),

    #[error("Failed to scan for peers: {0}")]
    ScanFailed(String),

    #[error("Peer not found: {peer}")]
    PeerNotFound { peer: String },

    #[error("Failed to connect to peer: {0}")]
    ConnectionFailed(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Failed to discover services: {0}")]
    ServiceDiscoveryFailed(String),

    #[error("Characteristic not found: {characteristic}")]
    CharacteristicNotFound { characteristic: String },

    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    #[error("Failed to write to characteristic: {0}")]
    WriteFailed(String),

    #[error("Peer not connected")]
    NotConnected,
}

impl From<BleUartError> for TransportError {
    fn from(err: BleUartError) -> Self {
        TransportError::CommandFailed {
            command: "ble",
            reason: err.to_string(),
        }
    }
}

impl From<BleUartError> for UartError {
    fn from(err: BleUartError) -> Self {
        match err {
            BleUartError::AdapterNotAvailable => UartError::TransportMissing,
            other => UartError::Transport(other.into()),
        }
    }
}
