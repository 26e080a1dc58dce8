//! uartlink CLI library
//!
//! Wires the BLE transport and file storage into the runtime and provides the
//! interactive console.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod console;
pub mod error;

pub use app::{StatusReport, UartApp};
pub use cli::{Cli, Commands};
pub use commands::CommandDispatcher;
pub use config::{AppConfig, ConsoleConfig, StorageConfig};
pub use console::{Console, ConsoleCommand};
pub use error::{CliError, Result};

// Re-export commonly used types
pub use uartlink_core::{ConnectionState, PeerId, SessionRecord};
