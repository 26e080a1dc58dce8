//! Durable storage collaborators
//!
//! Both traits may block on I/O, so the runtime only calls them from its
//! storage worker, never from the dispatch loop.

use async_trait::async_trait;

use crate::errors::StorageError;
use crate::types::PeerId;

/// Durable store of the single "last connected peer"
#[async_trait]
pub trait PeerDirectory: Send + Sync {
    async fn last_peer(&self) -> Result<Option<PeerId>, StorageError>;

    async fn set_last_peer(&self, peer: &PeerId) -> Result<(), StorageError>;
}

/// Append-only destination of transcript lines
#[async_trait]
pub trait TranscriptSink: Send {
    /// Append one line; the sink adds the line terminator
    async fn append(&mut self, line: &str) -> Result<(), StorageError>;
}
