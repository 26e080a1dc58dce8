//! BLE UART transport configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the BLE UART transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleUartConfig {
    /// Maximum time to scan for the requested peer
    pub scan_timeout_ms: u64,
    /// How often the adapter's peripheral list is checked while scanning
    pub scan_poll_interval_ms: u64,
    /// Maximum time to wait for the link to come up
    pub connection_timeout_ms: u64,
    /// Largest payload written in one GATT write (ATT MTU minus header)
    pub write_chunk_size: usize,
    /// Use acknowledged writes instead of write-without-response
    pub write_with_response: bool,
}

impl Default for BleUartConfig {
    fn default() -> Self {
        Self {
            scan_timeout_ms: 5_000,
            scan_poll_interval_ms: 250,
            connection_timeout_ms: 10_000,
            write_chunk_size: 20, // Default ATT MTU of 23
            write_with_response: false,
        }
    }
}

impl BleUartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set scan timeout
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set connection timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the write chunk size; zero is raised to one byte
    pub fn with_write_chunk_size(mut self, size: usize) -> Self {
        self.write_chunk_size = size.max(1);
        self
    }

    pub fn with_write_response(mut self, enabled: bool) -> Self {
        self.write_with_response = enabled;
        self
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn scan_poll_interval(&self) -> Duration {
        Duration::from_millis(self.scan_poll_interval_ms.max(1))
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn chunk_size(&self) -> usize {
        self.write_chunk_size.max(1)
    }
}
