//! Shared test collaborators: a recording transport and in-memory storage

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uartlink_runtime::{
    PeerDirectory, PeerId, RecordKind, RuntimeBuilder, RuntimeHandle, SessionRecord, StorageError,
    SupervisorConfig, TranscriptSink, TransportError, TransportEvent, TransportEventSender,
    TransportFacade,
};

// ----------------------------------------------------------------------------
// Mock Transport
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(String),
    Disconnect,
    Close,
    Write(Vec<u8>),
    EnableNotifications,
}

/// Transport that only records what it was asked to do
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    calls: Arc<Mutex<Vec<Call>>>,
    unbound: Arc<Mutex<bool>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every command with `NotBound`
    pub fn set_unbound(&self, unbound: bool) {
        *self.unbound.lock().unwrap() = unbound;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn connects(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Connect(_)))
            .count()
    }

    fn push(&self, call: Call) -> Result<(), TransportError> {
        if *self.unbound.lock().unwrap() {
            return Err(TransportError::NotBound);
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl TransportFacade for MockTransport {
    fn connect(&self, peer: &PeerId) -> Result<(), TransportError> {
        self.push(Call::Connect(peer.to_string()))
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        self.push(Call::Disconnect)
    }

    fn close(&self) -> Result<(), TransportError> {
        self.push(Call::Close)
    }

    fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        self.push(Call::Write(data.to_vec()))
    }

    fn enable_notifications(&self) -> Result<(), TransportError> {
        self.push(Call::EnableNotifications)
    }
}

// ----------------------------------------------------------------------------
// In-memory storage
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    peer: Mutex<Option<PeerId>>,
    failing: bool,
}

impl MemoryDirectory {
    pub fn with_peer(peer: &str) -> Self {
        Self {
            peer: Mutex::new(Some(PeerId::new(peer).unwrap())),
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            peer: Mutex::new(None),
            failing: true,
        }
    }

    pub fn stored(&self) -> Option<PeerId> {
        self.peer.lock().unwrap().clone()
    }
}

#[async_trait]
impl PeerDirectory for MemoryDirectory {
    async fn last_peer(&self) -> Result<Option<PeerId>, StorageError> {
        if self.failing {
            return Err(StorageError::Corrupt {
                reason: "unreadable".to_string(),
            });
        }
        Ok(self.stored())
    }

    async fn set_last_peer(&self, peer: &PeerId) -> Result<(), StorageError> {
        if self.failing {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )));
        }
        *self.peer.lock().unwrap() = Some(peer.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTranscript {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryTranscript {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptSink for MemoryTranscript {
    async fn append(&mut self, line: &str) -> Result<(), StorageError> {
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }
}

pub struct FailingTranscript;

#[async_trait]
impl TranscriptSink for FailingTranscript {
    async fn append(&mut self, _line: &str) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }
}

// ----------------------------------------------------------------------------
// Harness
// ----------------------------------------------------------------------------

pub struct Harness {
    pub handle: RuntimeHandle,
    pub events: TransportEventSender,
    pub transport: MockTransport,
    pub directory: Arc<MemoryDirectory>,
    pub transcript: MemoryTranscript,
}

impl Harness {
    pub async fn start(directory: MemoryDirectory) -> Self {
        Self::start_with(directory, SupervisorConfig::default()).await
    }

    pub async fn start_with(directory: MemoryDirectory, config: SupervisorConfig) -> Self {
        let transport = MockTransport::new();
        let directory = Arc::new(directory);
        let transcript = MemoryTranscript::default();

        let mut builder = RuntimeBuilder::new().supervisor_config(config);
        let events = builder.event_sender();
        let handle = builder
            .transport(Arc::new(transport.clone()))
            .peer_directory(directory.clone())
            .transcript(transcript.clone())
            .start()
            .await
            .expect("runtime starts");

        Self {
            handle,
            events,
            transport,
            directory,
            transcript,
        }
    }

    pub async fn event(&self, event: TransportEvent) {
        self.events.send(event).await.expect("dispatcher alive");
    }

    /// Records so far; also waits for everything queued before it
    pub async fn records(&self) -> Vec<SessionRecord> {
        self.handle.snapshot().await.expect("dispatcher alive")
    }

    pub async fn kinds(&self) -> Vec<(RecordKind, String)> {
        self.records()
            .await
            .iter()
            .map(|record| (record.kind(), record.text().to_string()))
            .collect()
    }
}
