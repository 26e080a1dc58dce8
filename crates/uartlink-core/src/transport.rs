//! Transport command surface and event channel
//!
//! The supervisor drives the transport through [`TransportFacade`]. Every call
//! is a non-blocking request: it returns as soon as the request is queued and
//! the outcome arrives later as a [`TransportEvent`] on the event channel.

use crate::config::ChannelConfig;
use crate::errors::TransportError;
use crate::event::TransportEvent;
use crate::types::PeerId;

pub type TransportEventSender = tokio::sync::mpsc::Sender<TransportEvent>;
pub type TransportEventReceiver = tokio::sync::mpsc::Receiver<TransportEvent>;

/// Create the bounded event channel (Transport -> Dispatcher)
pub fn create_event_channel(
    config: &ChannelConfig,
) -> (TransportEventSender, TransportEventReceiver) {
    tokio::sync::mpsc::channel(config.event_buffer_size)
}

// ----------------------------------------------------------------------------
// Transport Facade
// ----------------------------------------------------------------------------

/// Fire-and-forget command surface of the transport
///
/// Implementations must not block the caller. An `Err` means the request was
/// not accepted at all (typically [`TransportError::NotBound`]); it is never
/// used to report the outcome of an accepted request.
pub trait TransportFacade: Send + Sync {
    /// Start connecting to `peer`
    fn connect(&self, peer: &PeerId) -> Result<(), TransportError>;

    /// Tear the current link down; a `Disconnected` event follows
    fn disconnect(&self) -> Result<(), TransportError>;

    /// Release the resources held for the last link
    fn close(&self) -> Result<(), TransportError>;

    /// Write an opaque payload to the peer
    fn write(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Subscribe to the peer's data notifications
    fn enable_notifications(&self) -> Result<(), TransportError>;
}
