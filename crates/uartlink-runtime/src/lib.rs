//! uartlink Runtime Engine
//!
//! This crate drives a single peer connection on top of the types in
//! `uartlink-core`:
//! - `ConnectionSupervisor`: the lifecycle state machine and reconnect policy
//! - `EventDispatcher`: the serialized loop that applies every input in order
//! - `SessionLog`: the ordered transcript and its durable storage worker
//! - `RuntimeBuilder` / `RuntimeHandle`: wiring and the presentation-side API
//!
//! Transport callbacks, user commands and timer firings all funnel into the
//! dispatcher, so no state is ever touched from two contexts at once.

pub mod builder;
pub mod dispatcher;
pub mod retry;
pub mod session_log;
pub mod storage;
pub mod supervisor;

pub use builder::{RuntimeBuilder, RuntimeHandle};
pub use dispatcher::{EventDispatcher, InternalInput};
pub use retry::{RetryTimer, RetryToken};
pub use session_log::{Notification, SessionLog};
pub use storage::{FileTranscript, JsonPeerDirectory, StorageCommand, StorageReport};
pub use supervisor::{ConnectionSupervisor, DisconnectCause, Effect, SupervisorInput};

// Re-export core types for convenience
pub use uartlink_core::{
    ChannelConfig, ConnectionState, PeerDirectory, PeerId, RecordKind, SessionRecord,
    StorageError, SupervisorConfig, TranscriptSink, TransportError, TransportEvent,
    TransportEventSender, TransportFacade, UartError, UartResult, UserCommand,
};
