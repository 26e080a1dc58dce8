//! Session records and the transcript line format
//!
//! A transcript line is `[<local time>] <prefix>: <text>`. Line breaks inside
//! the text are escaped so that one record always occupies exactly one line.

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Local wall-clock format used in transcript lines
pub const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

// ----------------------------------------------------------------------------
// Record Kind
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Connected,
    Disconnected,
    Received,
    Sent,
    Info,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::Connected,
        RecordKind::Disconnected,
        RecordKind::Received,
        RecordKind::Sent,
        RecordKind::Info,
    ];

    /// Prefix written before the record text
    pub fn prefix(&self) -> &'static str {
        match self {
            RecordKind::Connected => "Connected to",
            RecordKind::Disconnected => "Disconnected from",
            RecordKind::Received => "RX",
            RecordKind::Sent => "TX",
            RecordKind::Info => "INFO",
        }
    }
}

// ----------------------------------------------------------------------------
// Session Record
// ----------------------------------------------------------------------------

/// One immutable, timestamped transcript entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    timestamp: DateTime<Local>,
    kind: RecordKind,
    text: String,
}

impl SessionRecord {
    /// Create a record stamped with the current local time
    pub fn new(kind: RecordKind, text: impl Into<String>) -> Self {
        Self::with_timestamp(Local::now(), kind, text)
    }

    pub fn with_timestamp(
        timestamp: DateTime<Local>,
        kind: RecordKind,
        text: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            kind,
            text: text.into(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Render the transcript line, without the trailing newline
    pub fn to_line(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.kind.prefix(),
            escape_line_breaks(&self.text)
        )
    }
}

impl fmt::Display for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

fn escape_line_breaks(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
    }
    escaped
}
