//! BLE UART transport facade
//!
//! Implements [`TransportFacade`] by queueing [`LinkCommand`]s for the link
//! worker. Every call returns immediately; outcomes arrive on the event channel.

use btleplug::api::Manager as _;
use btleplug::platform::Manager;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;
use uartlink_core::{PeerId, TransportError, TransportEventSender, TransportFacade};

use crate::config::BleUartConfig;
use crate::error::BleUartError;
use crate::link::{LinkCommand, LinkWorker};

pub struct BleUartTransport {
    commands: mpsc::UnboundedSender<LinkCommand>,
    worker: Option<JoinHandle<()>>,
}

impl BleUartTransport {
    /// Bind the first BLE adapter and start the link worker
    pub async fn start(
        config: BleUartConfig,
        events: TransportEventSender,
    ) -> Result<Self, BleUartError> {
        let manager = Manager::new()
            .await
            .map_err(|e| BleUartError::Manager(e.to_string()))?;
        let adapters = manager
            .adapters()
            .await
            .map_err(|e| BleUartError::Manager(e.to_string()))?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(BleUartError::AdapterNotAvailable)?;
        info!("BLE adapter initialized");

        let (commands, receiver) = mpsc::unbounded_channel();
        let worker = LinkWorker::new(adapter, config, events, receiver);
        Ok(Self {
            commands,
            worker: Some(tokio::spawn(worker.run())),
        })
    }

    /// Facade over an externally driven command queue
    pub fn from_sender(commands: mpsc::UnboundedSender<LinkCommand>) -> Self {
        Self {
            commands,
            worker: None,
        }
    }

    /// Whether commands still reach a running worker
    pub fn is_bound(&self) -> bool {
        let worker_alive = self
            .worker
            .as_ref()
            .map(|worker| !worker.is_finished())
            .unwrap_or(true);
        worker_alive && !self.commands.is_closed()
    }

    fn queue(&self, command: LinkCommand) -> Result<(), TransportError> {
        self.commands
            .send(command)
            .map_err(|_| TransportError::NotBound)
    }
}

impl TransportFacade for BleUartTransport {
    fn connect(&self, peer: &PeerId) -> Result<(), TransportError> {
        self.queue(LinkCommand::Connect(peer.clone()))
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        self.queue(LinkCommand::Disconnect)
    }

    fn close(&self) -> Result<(), TransportError> {
        self.queue(LinkCommand::Close)
    }

    fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        self.queue(LinkCommand::Write(data.to_vec()))
    }

    fn enable_notifications(&self) -> Result<(), TransportError> {
        self.queue(LinkCommand::EnableNotifications)
    }
}
