//! Storage worker and file-backed collaborators
//!
//! Durable writes may block, so they run on their own task. The worker
//! processes commands in order and reports failures back to the dispatcher
//! on an unbounded channel, which turns them into `Info` records. A failed write is never retried and
//! never rolls back the in-memory state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uartlink_core::{PeerDirectory, PeerId, StorageError, TranscriptSink};

// ----------------------------------------------------------------------------
// Storage Worker
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCommand {
    Append(String),
    SaveLastPeer(PeerId),
}

/// A durable write that failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageReport {
    pub operation: &'static str,
    pub reason: String,
}

pub(crate) struct StorageTask {
    commands: mpsc::UnboundedReceiver<StorageCommand>,
    transcript: Option<Box<dyn TranscriptSink>>,
    directory: Option<Arc<dyn PeerDirectory>>,
    reports: mpsc::UnboundedSender<StorageReport>,
}

impl StorageTask {
    pub(crate) fn new(
        commands: mpsc::UnboundedReceiver<StorageCommand>,
        transcript: Option<Box<dyn TranscriptSink>>,
        directory: Option<Arc<dyn PeerDirectory>>,
        reports: mpsc::UnboundedSender<StorageReport>,
    ) -> Self {
        Self {
            commands,
            transcript,
            directory,
            reports,
        }
    }

    /// Run until the command channel closes, draining what is queued
    pub(crate) async fn run(mut self) {
        debug!("Storage task starting");
        while let Some(command) = self.commands.recv().await {
            match command {
                StorageCommand::Append(line) => {
                    if let Some(transcript) = self.transcript.as_mut() {
                        if let Err(e) = transcript.append(&line).await {
                            self.report("transcript append", e);
                        }
                    }
                }
                StorageCommand::SaveLastPeer(peer) => {
                    if let Some(directory) = &self.directory {
                        match directory.set_last_peer(&peer).await {
                            Ok(()) => debug!("Remembered peer {}", peer),
                            Err(e) => self.report("peer directory write", e),
                        }
                    }
                }
            }
        }
        debug!("Storage task stopped");
    }

    fn report(&self, operation: &'static str, error: StorageError) {
        warn!("{} failed: {}", operation, error);
        let report = StorageReport {
            operation,
            reason: error.to_string(),
        };
        if self.reports.send(report).is_err() {
            debug!("Dispatcher gone, {} failure not reported", operation);
        }
    }
}

// ----------------------------------------------------------------------------
// File Transcript
// ----------------------------------------------------------------------------

/// Transcript file opened in append mode for every line
#[derive(Debug, Clone)]
pub struct FileTranscript {
    path: PathBuf,
}

impl FileTranscript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TranscriptSink for FileTranscript {
    async fn append(&mut self, line: &str) -> Result<(), StorageError> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// JSON Peer Directory
// ----------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct DirectoryState {
    last_peer: Option<PeerId>,
}

/// Peer directory persisted as a small JSON document
#[derive(Debug, Clone)]
pub struct JsonPeerDirectory {
    path: PathBuf,
}

impl JsonPeerDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Forget the remembered peer
    pub async fn clear(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PeerDirectory for JsonPeerDirectory {
    async fn last_peer(&self) -> Result<Option<PeerId>, StorageError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state: DirectoryState =
            serde_json::from_str(&contents).map_err(|e| StorageError::Corrupt {
                reason: format!("{}: {}", self.path.display(), e),
            })?;
        Ok(state.last_peer)
    }

    async fn set_last_peer(&self, peer: &PeerId) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let state = DirectoryState {
            last_peer: Some(peer.clone()),
        };
        let contents =
            serde_json::to_string_pretty(&state).map_err(|e| StorageError::Serialization {
                reason: e.to_string(),
            })?;
        tokio::fs::write(&self.path, contents).await?;
        info!("Stored last peer {} in {}", peer, self.path.display());
        Ok(())
    }
}
