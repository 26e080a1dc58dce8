//! uartlink CLI Configuration
//!
//! One TOML file holds every section; missing sections and fields fall back to
//! their defaults. The data directory can be overridden from the command line.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uartlink_ble::BleUartConfig;
use uartlink_core::{ChannelConfig, SupervisorConfig};

use crate::error::{CliError, Result};

const APP_DIR_NAME: &str = "uartlink";

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the uartlink CLI application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Reconnect policy and transcript selection
    pub supervisor: SupervisorConfig,
    /// Dispatcher channel sizes
    pub channels: ChannelConfig,
    /// BLE transport configuration
    pub ble: BleUartConfig,
    /// Where the transcript and remembered peer live
    pub storage: StorageConfig,
    /// Console settings
    pub console: ConsoleConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Defaults to the platform data directory
    pub data_dir: Option<PathBuf>,
    pub transcript_file: String,
    pub peer_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub prompt: String,
    /// Print connection state changes between records
    pub show_state_changes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            transcript_file: "transcript.txt".to_string(),
            peer_file: "last_peer.json".to_string(),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            prompt: "uart> ".to_string(),
            show_state_changes: true,
        }
    }
}

// ----------------------------------------------------------------------------
// Loading and Paths
// ----------------------------------------------------------------------------

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path.as_ref(), toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.supervisor.validate()?;
        self.channels.validate()?;
        if self.storage.transcript_file.trim().is_empty() {
            return Err(CliError::Config("Transcript file name cannot be empty".into()));
        }
        if self.storage.peer_file.trim().is_empty() {
            return Err(CliError::Config("Peer file name cannot be empty".into()));
        }
        Ok(())
    }

    /// Directory holding the transcript and the remembered peer
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.storage.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR_NAME))
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.transcript_file)
    }

    pub fn peer_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.peer_file)
    }

    /// Default configuration rendered as TOML
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| "# Failed to render the default configuration\n".to_string())
    }
}
