//! Session transcript
//!
//! Ordered, append-only list of [`SessionRecord`]s. Every record is published
//! to subscribers as it is created; records of the configured kinds are also
//! handed to the storage worker for the durable transcript.

use std::collections::HashSet;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use uartlink_core::{ConnectionState, RecordKind, SessionRecord};

use crate::storage::StorageCommand;

/// Ordered presentation stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    State(ConnectionState),
    Record(SessionRecord),
}

pub struct SessionLog {
    records: Vec<SessionRecord>,
    persisted_kinds: HashSet<RecordKind>,
    notifications: broadcast::Sender<Notification>,
    storage: Option<mpsc::UnboundedSender<StorageCommand>>,
}

impl SessionLog {
    pub fn new(
        persisted_kinds: impl IntoIterator<Item = RecordKind>,
        notifications: broadcast::Sender<Notification>,
        storage: Option<mpsc::UnboundedSender<StorageCommand>>,
    ) -> Self {
        Self {
            records: Vec::new(),
            persisted_kinds: persisted_kinds.into_iter().collect(),
            notifications,
            storage,
        }
    }

    /// Append a record; `persist = false` keeps it out of the durable transcript
    pub fn record(&mut self, kind: RecordKind, text: impl Into<String>, persist: bool) {
        let record = SessionRecord::new(kind, text);
        debug!("{}", record);

        if persist && self.persisted_kinds.contains(&kind) {
            self.persist(&record);
        }
        // No subscribers is fine, the list is still authoritative
        let _ = self
            .notifications
            .send(Notification::Record(record.clone()));
        self.records.push(record);
    }

    pub fn publish_state(&self, state: ConnectionState) {
        let _ = self.notifications.send(Notification::State(state));
    }

    pub fn snapshot(&self) -> Vec<SessionRecord> {
        self.records.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stop forwarding to durable storage
    pub fn detach_storage(&mut self) {
        self.storage = None;
    }

    fn persist(&mut self, record: &SessionRecord) {
        let Some(storage) = &self.storage else {
            return;
        };
        if storage.send(StorageCommand::Append(record.to_line())).is_err() {
            warn!("Storage worker gone, transcript no longer persisted");
            self.storage = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with_storage(
        kinds: &[RecordKind],
    ) -> (
        SessionLog,
        broadcast::Receiver<Notification>,
        mpsc::UnboundedReceiver<StorageCommand>,
    ) {
        let (notify_tx, notify_rx) = broadcast::channel(16);
        let (storage_tx, storage_rx) = mpsc::unbounded_channel();
        let log = SessionLog::new(kinds.iter().copied(), notify_tx, Some(storage_tx));
        (log, notify_rx, storage_rx)
    }

    #[test]
    fn test_records_keep_arrival_order() {
        let (mut log, _notify, _storage) = log_with_storage(&RecordKind::ALL);
        log.record(RecordKind::Connected, "AA:BB", true);
        log.record(RecordKind::Received, "hi", true);
        log.record(RecordKind::Received, "hi", true);

        let texts: Vec<_> = log.snapshot().iter().map(|r| r.text().to_string()).collect();
        assert_eq!(texts, vec!["AA:BB", "hi", "hi"]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_only_selected_kinds_are_persisted() {
        let (mut log, _notify, mut storage) = log_with_storage(&[RecordKind::Received]);
        log.record(RecordKind::Connected, "AA:BB", true);
        log.record(RecordKind::Received, "hi", true);
        log.record(RecordKind::Received, "quiet", false);

        let line = match storage.try_recv().unwrap() {
            StorageCommand::Append(line) => line,
            other => panic!("unexpected storage command {:?}", other),
        };
        assert!(line.ends_with("] RX: hi"));
        assert!(storage.try_recv().is_err());
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_notifications_follow_record_order() {
        let (mut log, mut notify, _storage) = log_with_storage(&[]);
        log.publish_state(ConnectionState::Connected);
        log.record(RecordKind::Connected, "AA:BB", true);

        assert_eq!(
            notify.try_recv().unwrap(),
            Notification::State(ConnectionState::Connected)
        );
        match notify.try_recv().unwrap() {
            Notification::Record(record) => assert_eq!(record.kind(), RecordKind::Connected),
            other => panic!("unexpected notification {:?}", other),
        }
    }

    #[test]
    fn test_dropped_storage_keeps_memory_log() {
        let (mut log, _notify, storage) = log_with_storage(&RecordKind::ALL);
        drop(storage);

        log.record(RecordKind::Sent, "one", true);
        log.record(RecordKind::Sent, "two", true);
        assert_eq!(log.len(), 2);
    }
}
