//! Peer identity and connection state

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::UartError;

// ----------------------------------------------------------------------------
// Peer Identity
// ----------------------------------------------------------------------------

/// Opaque, stable identifier of the remote endpoint
///
/// For BLE this is the device address (`AA:BB:CC:DD:EE:FF`) or, on platforms
/// that hide addresses, the platform peripheral id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(String);

impl PeerId {
    /// Create a peer id, rejecting blank input
    pub fn new(id: impl Into<String>) -> Result<Self, UartError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(UartError::InvalidPeerId { input: id });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison, BLE addresses are reported in either case
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PeerId {
    type Error = UartError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PeerId::new(value)
    }
}

impl From<PeerId> for String {
    fn from(peer: PeerId) -> Self {
        peer.0
    }
}

impl FromStr for PeerId {
    type Err = UartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PeerId::new(s)
    }
}

// ----------------------------------------------------------------------------
// Connection State
// ----------------------------------------------------------------------------

/// Lifecycle state of the single logical connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
