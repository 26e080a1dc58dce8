//! Application wiring: BLE transport, file storage and the runtime

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use uartlink_ble::BleUartTransport;
use uartlink_core::{PeerDirectory, PeerId, UartError};
use uartlink_runtime::{FileTranscript, JsonPeerDirectory, RuntimeBuilder, RuntimeHandle};

use crate::config::AppConfig;
use crate::error::Result;

/// What the `status` subcommand reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub last_peer: Option<PeerId>,
    pub transcript: std::path::PathBuf,
    pub transcript_exists: bool,
}

pub struct UartApp {
    config: AppConfig,
}

impl UartApp {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn peer_directory(&self) -> JsonPeerDirectory {
        JsonPeerDirectory::new(self.config.peer_path())
    }

    /// Bind the adapter and start the runtime
    pub async fn start(&self, autoconnect: bool) -> Result<RuntimeHandle> {
        let data_dir = self.config.data_dir();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let supervisor = self
            .config
            .supervisor
            .clone()
            .with_autoconnect(self.config.supervisor.autoconnect && autoconnect);

        let mut builder = RuntimeBuilder::new()
            .supervisor_config(supervisor)
            .channel_config(self.config.channels.clone());

        info!("Initializing BLE transport...");
        let transport = BleUartTransport::start(self.config.ble.clone(), builder.event_sender())
            .await
            .map_err(UartError::from)?;

        let handle = builder
            .transport(Arc::new(transport))
            .peer_directory(Arc::new(self.peer_directory()))
            .transcript(FileTranscript::new(self.config.transcript_path()))
            .start()
            .await?;
        info!("Transcript: {}", self.config.transcript_path().display());
        Ok(handle)
    }

    pub async fn status(&self) -> Result<StatusReport> {
        let last_peer = self.peer_directory().last_peer().await?;
        let transcript = self.config.transcript_path();
        let transcript_exists = tokio::fs::try_exists(&transcript).await.unwrap_or(false);
        Ok(StatusReport {
            last_peer,
            transcript,
            transcript_exists,
        })
    }

    pub async fn forget(&self) -> Result<()> {
        self.peer_directory().clear().await?;
        info!("Remembered peer cleared");
        Ok(())
    }
}
