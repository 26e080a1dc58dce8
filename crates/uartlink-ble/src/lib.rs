//! Bluetooth Low Energy UART transport for uartlink
//!
//! This crate provides a transport that implements `TransportFacade` from
//! `uartlink-core` on top of the Nordic UART Service, using `btleplug` in the
//! central role.
//!
//! ## Architecture
//!
//! - [`config`] - Transport configuration and settings
//! - [`error`] - Error types specific to the BLE transport
//! - [`protocol`] - Nordic UART Service UUIDs and payload helpers
//! - `link` - The worker task owning the adapter and the peripheral
//! - [`transport`] - The non-blocking facade handed to the runtime
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use uartlink_ble::{BleUartConfig, BleUartTransport};
//! use uartlink_runtime::RuntimeBuilder;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = RuntimeBuilder::new();
//! let transport = BleUartTransport::start(BleUartConfig::new(), builder.event_sender()).await?;
//! let handle = builder.transport(Arc::new(transport)).start().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod link;
mod protocol;
mod transport;

// Public API exports
pub use config::BleUartConfig;
pub use error::BleUartError;
pub use link::LinkCommand;
pub use protocol::{
    chunk_payload, matches_peer, supports_uart, NUS_RX_CHARACTERISTIC_UUID, NUS_SERVICE_UUID,
    NUS_TX_CHARACTERISTIC_UUID,
};
pub use transport::BleUartTransport;

// Re-export the facade trait for convenience
pub use uartlink_core::TransportFacade;
