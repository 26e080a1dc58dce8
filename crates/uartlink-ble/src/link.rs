//! BLE link worker
//!
//! Owns the adapter and the single peripheral link. Commands from the facade
//! are processed one at a time; link changes, service discovery results and
//! incoming data go back to the runtime as [`TransportEvent`]s.
//!
//! Connection attempts (scan + connect) run on their own task so that a
//! `Disconnect` can cancel one that is still in flight. A failed attempt is
//! only logged: the supervisor's retry timer decides when to try again.

use std::pin::Pin;

use btleplug::api::{Central, CentralEvent, Characteristic, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use futures::stream::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};
use uartlink_core::{PeerId, TransportEvent, TransportEventSender};
use uuid::Uuid;

use crate::config::BleUartConfig;
use crate::error::BleUartError;
use crate::protocol::{
    chunk_payload, matches_peer, supports_uart, NUS_RX_CHARACTERISTIC_UUID,
    NUS_TX_CHARACTERISTIC_UUID,
};

type CentralEvents = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

// ----------------------------------------------------------------------------
// Link Commands
// ----------------------------------------------------------------------------

/// Requests queued by the transport facade
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    Connect(PeerId),
    Disconnect,
    Close,
    Write(Vec<u8>),
    EnableNotifications,
}

impl LinkCommand {
    pub fn name(&self) -> &'static str {
        match self {
            LinkCommand::Connect(_) => "connect",
            LinkCommand::Disconnect => "disconnect",
            LinkCommand::Close => "close",
            LinkCommand::Write(_) => "write",
            LinkCommand::EnableNotifications => "enable notifications",
        }
    }
}

/// A connect attempt that succeeded, tagged with the attempt it belongs to
struct Established {
    generation: u64,
    peripheral: Peripheral,
}

struct Link {
    peripheral: Peripheral,
    up: bool,
    notifications: Option<JoinHandle<()>>,
}

impl Link {
    fn stop_notifications(&mut self) {
        if let Some(handle) = self.notifications.take() {
            handle.abort();
        }
    }
}

// ----------------------------------------------------------------------------
// Link Worker
// ----------------------------------------------------------------------------

pub(crate) struct LinkWorker {
    adapter: Adapter,
    config: BleUartConfig,
    events: TransportEventSender,
    commands: mpsc::UnboundedReceiver<LinkCommand>,
    established_sender: mpsc::Sender<Established>,
    established_receiver: mpsc::Receiver<Established>,
    /// Bumped on every connect or cancel; outcomes of older attempts are dropped
    generation: u64,
    attempt: Option<JoinHandle<()>>,
    link: Option<Link>,
    running: bool,
}

impl LinkWorker {
    pub(crate) fn new(
        adapter: Adapter,
        config: BleUartConfig,
        events: TransportEventSender,
        commands: mpsc::UnboundedReceiver<LinkCommand>,
    ) -> Self {
        let (established_sender, established_receiver) = mpsc::channel(4);
        Self {
            adapter,
            config,
            events,
            commands,
            established_sender,
            established_receiver,
            generation: 0,
            attempt: None,
            link: None,
            running: true,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("BLE link worker starting");

        let mut central = match self.adapter.events().await {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!("Adapter events unavailable, link drops will go unnoticed: {}", e);
                None
            }
        };

        while self.running {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.process_command(command).await,
                        None => {
                            info!("Link command channel closed, shutting down");
                            break;
                        }
                    }
                }

                Some(established) = self.established_receiver.recv() => {
                    self.process_established(established).await;
                }

                event = next_central_event(&mut central) => {
                    match event {
                        Some(event) => self.process_central_event(event).await,
                        None => {
                            warn!("Adapter event stream ended");
                            central = None;
                            self.emit(TransportEvent::AdapterStateChanged { enabled: false })
                                .await;
                        }
                    }
                }
            }
        }

        self.release().await;
        info!("BLE link worker stopped");
    }

    async fn process_command(&mut self, command: LinkCommand) {
        let name = command.name();
        debug!("Link command: {}", name);

        let result = match command {
            LinkCommand::Connect(peer) => {
                self.connect(peer);
                Ok(())
            }
            LinkCommand::Disconnect => self.disconnect().await,
            LinkCommand::Close => {
                self.close();
                Ok(())
            }
            LinkCommand::Write(data) => self.write(&data).await,
            LinkCommand::EnableNotifications => self.enable_notifications().await,
        };

        if let Err(e) = result {
            warn!("Link {} failed: {}", name, e);
        }
    }

    fn connect(&mut self, peer: PeerId) {
        if self.link.as_ref().is_some_and(|link| link.up) {
            debug!("Link already up, ignoring connect to {}", peer);
            return;
        }

        self.cancel_attempt();
        let generation = self.generation;
        let adapter = self.adapter.clone();
        let config = self.config.clone();
        let established = self.established_sender.clone();

        info!("Connecting to {}", peer);
        self.attempt = Some(tokio::spawn(async move {
            match establish(&adapter, &peer, &config).await {
                Ok(peripheral) => {
                    let _ = established
                        .send(Established {
                            generation,
                            peripheral,
                        })
                        .await;
                }
                Err(e) => warn!("Connection attempt to {} failed: {}", peer, e),
            }
        }));
    }

    fn cancel_attempt(&mut self) {
        self.generation += 1;
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }
    }

    async fn process_established(&mut self, established: Established) {
        let Established {
            generation,
            peripheral,
        } = established;

        if generation != self.generation {
            debug!("Dropping link from a cancelled attempt");
            if let Err(e) = peripheral.disconnect().await {
                warn!("Failed to drop stale link: {}", e);
            }
            return;
        }

        self.attempt = None;
        self.close();
        self.link = Some(Link {
            peripheral: peripheral.clone(),
            up: true,
            notifications: None,
        });
        info!("Link up");
        if !self.emit(TransportEvent::Connected).await {
            return;
        }

        match discover_uart(&peripheral).await {
            Ok(true) => {
                self.emit(TransportEvent::ServicesReady).await;
            }
            Ok(false) => {
                info!("Peer has no UART service");
                self.emit(TransportEvent::UnsupportedPeer).await;
            }
            Err(e) => {
                warn!("{}, dropping link", e);
                if let Err(e) = self.drop_link().await {
                    warn!("{}", e);
                }
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), BleUartError> {
        let attempt_pending = self.attempt.is_some();
        if attempt_pending {
            debug!("Cancelling connection attempt");
            if let Err(e) = self.adapter.stop_scan().await {
                debug!("Failed to stop scan: {}", e);
            }
        }
        self.cancel_attempt();

        let link_up = self.link.as_ref().is_some_and(|link| link.up);
        match disconnect_report(attempt_pending, link_up) {
            DisconnectReport::DropLink => self.drop_link().await,
            DisconnectReport::AttemptCancelled => {
                // The runtime waits for a Disconnected before it forgets the request
                self.emit(TransportEvent::Disconnected).await;
                Ok(())
            }
            DisconnectReport::Nothing => Ok(()),
        }
    }

    /// Take a live link down and report it
    async fn drop_link(&mut self) -> Result<(), BleUartError> {
        let Some(link) = self.link.as_mut().filter(|link| link.up) else {
            return Ok(());
        };
        link.up = false;
        link.stop_notifications();

        let result = link
            .peripheral
            .disconnect()
            .await
            .map_err(|e| BleUartError::ConnectionFailed(e.to_string()));
        self.emit(TransportEvent::Disconnected).await;
        result
    }

    fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.stop_notifications();
            debug!("Link resources released");
        }
    }

    async fn write(&self, data: &[u8]) -> Result<(), BleUartError> {
        let link = self.live_link()?;
        let characteristic = find_characteristic(&link.peripheral, NUS_RX_CHARACTERISTIC_UUID)?;
        let write_type = if self.config.write_with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };

        for chunk in chunk_payload(data, self.config.chunk_size()) {
            link.peripheral
                .write(&characteristic, chunk, write_type)
                .await
                .map_err(|e| BleUartError::WriteFailed(e.to_string()))?;
        }
        trace!("Wrote {} bytes: {}", data.len(), hex::encode(data));
        Ok(())
    }

    async fn enable_notifications(&mut self) -> Result<(), BleUartError> {
        let peripheral = self.live_link()?.peripheral.clone();
        let characteristic = find_characteristic(&peripheral, NUS_TX_CHARACTERISTIC_UUID)?;

        peripheral
            .subscribe(&characteristic)
            .await
            .map_err(|e| BleUartError::SubscriptionFailed(e.to_string()))?;
        let mut notifications = peripheral
            .notifications()
            .await
            .map_err(|e| BleUartError::SubscriptionFailed(e.to_string()))?;

        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != NUS_TX_CHARACTERISTIC_UUID {
                    continue;
                }
                trace!("Notification: {}", hex::encode(&notification.value));
                if events
                    .send(TransportEvent::DataReceived(notification.value))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            debug!("Notification stream ended");
        });

        if let Some(link) = self.link.as_mut() {
            link.stop_notifications();
            link.notifications = Some(handle);
        }
        info!("Notifications enabled");
        Ok(())
    }

    async fn process_central_event(&mut self, event: CentralEvent) {
        if let CentralEvent::DeviceDisconnected(id) = event {
            let ours = self
                .link
                .as_ref()
                .is_some_and(|link| link.up && link.peripheral.id() == id);
            if !ours {
                return;
            }

            info!("Link dropped by peer");
            if let Some(link) = self.link.as_mut() {
                link.up = false;
                link.stop_notifications();
            }
            self.emit(TransportEvent::Disconnected).await;
        }
    }

    fn live_link(&self) -> Result<&Link, BleUartError> {
        self.link
            .as_ref()
            .filter(|link| link.up)
            .ok_or(BleUartError::NotConnected)
    }

    /// Report an event; false once the runtime has gone away
    async fn emit(&mut self, event: TransportEvent) -> bool {
        if self.events.send(event).await.is_err() {
            info!("Event channel closed, stopping link worker");
            self.running = false;
            return false;
        }
        true
    }

    async fn release(&mut self) {
        self.cancel_attempt();
        if let Some(mut link) = self.link.take() {
            link.stop_notifications();
            if link.up {
                if let Err(e) = link.peripheral.disconnect().await {
                    warn!("Failed to disconnect on shutdown: {}", e);
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

async fn next_central_event(stream: &mut Option<CentralEvents>) -> Option<CentralEvent> {
    match stream {
        Some(stream) => stream.next().await,
        None => futures::future::pending().await,
    }
}

/// Find the peer and bring the link up
async fn establish(
    adapter: &Adapter,
    peer: &PeerId,
    config: &BleUartConfig,
) -> Result<Peripheral, BleUartError> {
    let peripheral = find_peripheral(adapter, peer, config).await?;
    if peripheral.is_connected().await.unwrap_or(false) {
        return Ok(peripheral);
    }

    match timeout(config.connection_timeout(), peripheral.connect()).await {
        Ok(Ok(())) => Ok(peripheral),
        Ok(Err(e)) => Err(BleUartError::ConnectionFailed(e.to_string())),
        Err(_) => Err(BleUartError::ConnectionTimeout),
    }
}

async fn find_peripheral(
    adapter: &Adapter,
    peer: &PeerId,
    config: &BleUartConfig,
) -> Result<Peripheral, BleUartError> {
    if let Some(peripheral) = lookup(adapter, peer).await? {
        return Ok(peripheral);
    }

    adapter
        .start_scan(ScanFilter::default())
        .await
        .map_err(|e| BleUartError::ScanFailed(e.to_string()))?;
    debug!("Scanning for {}", peer);

    let found = timeout(config.scan_timeout(), poll_for(adapter, peer, config)).await;
    if let Err(e) = adapter.stop_scan().await {
        debug!("Failed to stop scan: {}", e);
    }

    match found {
        Ok(result) => result,
        Err(_) => Err(BleUartError::PeerNotFound {
            peer: peer.to_string(),
        }),
    }
}

async fn poll_for(
    adapter: &Adapter,
    peer: &PeerId,
    config: &BleUartConfig,
) -> Result<Peripheral, BleUartError> {
    loop {
        tokio::time::sleep(config.scan_poll_interval()).await;
        if let Some(peripheral) = lookup(adapter, peer).await? {
            return Ok(peripheral);
        }
    }
}

async fn lookup(adapter: &Adapter, peer: &PeerId) -> Result<Option<Peripheral>, BleUartError> {
    let peripherals = adapter
        .peripherals()
        .await
        .map_err(|e| BleUartError::ScanFailed(e.to_string()))?;

    for peripheral in peripherals {
        let Ok(Some(properties)) = peripheral.properties().await else {
            continue;
        };
        let address = properties.address.to_string();
        if matches_peer(peer, &address, properties.local_name.as_deref()) {
            debug!("Found {} at {}", peer, address);
            return Ok(Some(peripheral));
        }
    }
    Ok(None)
}

/// How a disconnect request is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisconnectReport {
    /// Take the live link down; `drop_link` reports it
    DropLink,
    /// No link came up, report the cancelled attempt as a disconnect
    AttemptCancelled,
    Nothing,
}

fn disconnect_report(attempt_pending: bool, link_up: bool) -> DisconnectReport {
    if link_up {
        DisconnectReport::DropLink
    } else if attempt_pending {
        DisconnectReport::AttemptCancelled
    } else {
        DisconnectReport::Nothing
    }
}

/// Discover services; true when the UART service is present
async fn discover_uart(peripheral: &Peripheral) -> Result<bool, BleUartError> {
    peripheral
        .discover_services()
        .await
        .map_err(|e| BleUartError::ServiceDiscoveryFailed(e.to_string()))?;
    let characteristics = peripheral.characteristics();
    Ok(supports_uart(characteristics.iter().map(|c| &c.uuid)))
}

fn find_characteristic(peripheral: &Peripheral, uuid: Uuid) -> Result<Characteristic, BleUartError> {
    peripheral
        .characteristics()
        .into_iter()
        .find(|characteristic| characteristic.uuid == uuid)
        .ok_or_else(|| BleUartError::CharacteristicNotFound {
            characteristic: uuid.to_string(),
        })
}
