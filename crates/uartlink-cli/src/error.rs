//! Error handling for the uartlink CLI

use thiserror::Error;
use uartlink_ble::BleUartError;
use uartlink_core::{StorageError, UartError};

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("uartlink error: {0}")]
    Uart(#[from] UartError),

    #[error("BLE transport error: {0}")]
    Ble(#[from] BleUartError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Config(format!("{:#}", err))
    }
}
