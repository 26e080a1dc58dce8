//! Transport events and user commands
//!
//! These are the two external input sources of the dispatcher. Transport
//! events arrive from the radio stack's own tasks; user commands arrive from
//! the presentation layer.

use crate::types::PeerId;

// ----------------------------------------------------------------------------
// Transport Events
// ----------------------------------------------------------------------------

/// Discrete event produced by the transport, delivered one at a time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Link to the peer is up
    Connected,
    /// Link to the peer is down (requested or not)
    Disconnected,
    /// Peer services were discovered and the UART service is present
    ServicesReady,
    /// Notification payload from the peer
    DataReceived(Vec<u8>),
    /// Peer lacks the UART service
    UnsupportedPeer,
    /// The local adapter was powered on or off
    AdapterStateChanged { enabled: bool },
}

impl TransportEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::Connected => "Connected",
            TransportEvent::Disconnected => "Disconnected",
            TransportEvent::ServicesReady => "ServicesReady",
            TransportEvent::DataReceived(_) => "DataReceived",
            TransportEvent::UnsupportedPeer => "UnsupportedPeer",
            TransportEvent::AdapterStateChanged { .. } => "AdapterStateChanged",
        }
    }
}

// ----------------------------------------------------------------------------
// User Commands
// ----------------------------------------------------------------------------

/// Commands issued by the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Connect(PeerId),
    Disconnect,
    Send(Vec<u8>),
    SetTransportEnabled(bool),
}

impl UserCommand {
    pub fn name(&self) -> &'static str {
        match self {
            UserCommand::Connect(_) => "Connect",
            UserCommand::Disconnect => "Disconnect",
            UserCommand::Send(_) => "Send",
            UserCommand::SetTransportEnabled(_) => "SetTransportEnabled",
        }
    }
}
