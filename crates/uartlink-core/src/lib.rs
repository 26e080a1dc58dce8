//! Core types for the uartlink peer connection manager
//!
//! uartlink keeps a single logical connection to one remote peer over a
//! bidirectional byte-stream transport (a BLE UART bridge in practice),
//! restores it after unexpected drops and keeps an ordered transcript of the
//! traffic. This crate holds the stable vocabulary shared by the runtime, the
//! transport implementations and the presentation layer:
//!
//! - [`types`] - peer identity and connection state
//! - [`event`] - transport events and user commands
//! - [`record`] - session records and the transcript line format
//! - [`transport`] - the transport command surface and event channel
//! - [`storage`] - peer directory and transcript sink collaborators
//! - [`config`] - supervisor and channel configuration
//! - [`errors`] - error taxonomy

pub mod config;
pub mod errors;
pub mod event;
pub mod record;
pub mod storage;
pub mod transport;
pub mod types;

pub use config::{ChannelConfig, SupervisorConfig};
pub use errors::{StorageError, TransportError, UartError, UartResult};
pub use event::{TransportEvent, UserCommand};
pub use record::{RecordKind, SessionRecord};
pub use storage::{PeerDirectory, TranscriptSink};
pub use transport::{
    create_event_channel, TransportEventReceiver, TransportEventSender, TransportFacade,
};
pub use types::{ConnectionState, PeerId};
