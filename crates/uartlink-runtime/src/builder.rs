//! Runtime Builder
//!
//! Wires the collaborators together, spawns the dispatcher and storage tasks
//! and hands out a [`RuntimeHandle`] for the presentation layer.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uartlink_core::{
    create_event_channel, ChannelConfig, ConnectionState, PeerDirectory, PeerId, SessionRecord,
    SupervisorConfig, TranscriptSink, TransportEventReceiver, TransportEventSender,
    TransportFacade, UartError, UartResult, UserCommand,
};

use crate::dispatcher::{DispatcherParts, EventDispatcher, InternalInput};
use crate::session_log::{Notification, SessionLog};
use crate::storage::StorageTask;
use crate::supervisor::ConnectionSupervisor;

// ----------------------------------------------------------------------------
// Runtime Builder
// ----------------------------------------------------------------------------

/// Builder for a running connection manager
///
/// The transport needs the event sender at construction time, so take it
/// from the builder first:
///
/// ```rust,ignore
/// let mut builder = RuntimeBuilder::new();
/// let transport = Arc::new(MyTransport::new(builder.event_sender()));
/// let handle = builder.transport(transport).start().await?;
/// ```
pub struct RuntimeBuilder {
    supervisor_config: SupervisorConfig,
    channel_config: ChannelConfig,
    transport: Option<Arc<dyn TransportFacade>>,
    directory: Option<Arc<dyn PeerDirectory>>,
    transcript: Option<Box<dyn TranscriptSink>>,
    transport_enabled: bool,
    events: Option<(TransportEventSender, TransportEventReceiver)>,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            supervisor_config: SupervisorConfig::default(),
            channel_config: ChannelConfig::default(),
            transport: None,
            directory: None,
            transcript: None,
            transport_enabled: true,
            events: None,
        }
    }

    pub fn supervisor_config(mut self, config: SupervisorConfig) -> Self {
        self.supervisor_config = config;
        self
    }

    /// Set channel sizes; call before [`RuntimeBuilder::event_sender`]
    pub fn channel_config(mut self, config: ChannelConfig) -> Self {
        self.channel_config = config;
        self
    }

    /// Sender the transport uses to report its events
    pub fn event_sender(&mut self) -> TransportEventSender {
        let config = &self.channel_config;
        let (sender, _) = self
            .events
            .get_or_insert_with(|| create_event_channel(config));
        sender.clone()
    }

    pub fn transport(mut self, transport: Arc<dyn TransportFacade>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn peer_directory(mut self, directory: Arc<dyn PeerDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn transcript(mut self, transcript: impl TranscriptSink + 'static) -> Self {
        self.transcript = Some(Box::new(transcript));
        self
    }

    /// Whether the transport is usable at startup (adapter powered)
    pub fn transport_enabled(mut self, enabled: bool) -> Self {
        self.transport_enabled = enabled;
        self
    }

    /// Validate, read the remembered peer and start the tasks
    pub async fn start(mut self) -> UartResult<RuntimeHandle> {
        self.supervisor_config.validate()?;
        self.channel_config.validate()?;
        let transport = self.transport.take().ok_or(UartError::TransportMissing)?;

        let mut notices = Vec::new();
        let last_peer = match &self.directory {
            Some(directory) => match directory.last_peer().await {
                Ok(peer) => peer,
                Err(e) => {
                    warn!("Could not read the remembered peer: {}", e);
                    notices.push(format!("could not read remembered peer: {}", e));
                    None
                }
            },
            None => None,
        };

        let config = &self.channel_config;
        let (_, event_receiver) = self
            .events
            .take()
            .unwrap_or_else(|| create_event_channel(config));
        let (command_sender, command_receiver) = mpsc::channel(config.command_buffer_size);
        let (internal_sender, internal_receiver) = mpsc::channel(config.internal_buffer_size);
        let (notifications, _) = broadcast::channel(config.notification_buffer_size);
        let (state_sender, state_receiver) = watch::channel(ConnectionState::Disconnected);

        let (storage_sender, storage_receiver) = mpsc::unbounded_channel();
        let (report_sender, report_receiver) = mpsc::unbounded_channel();
        let storage_task = StorageTask::new(
            storage_receiver,
            self.transcript.take(),
            self.directory.clone(),
            report_sender,
        );
        let storage_handle = tokio::spawn(storage_task.run());

        let session_log = SessionLog::new(
            self.supervisor_config.persisted_kinds.iter().copied(),
            notifications.clone(),
            Some(storage_sender.clone()),
        );

        let mut dispatcher = EventDispatcher::new(DispatcherParts {
            supervisor: ConnectionSupervisor::new(self.supervisor_config.clone()),
            session_log,
            transport,
            command_receiver,
            event_receiver,
            internal_receiver,
            report_receiver,
            internal_sender: internal_sender.clone(),
            storage_sender: Some(storage_sender),
            storage_handle: Some(storage_handle),
            state_sender,
        });
        dispatcher.start(last_peer, self.transport_enabled, notices);

        let task = tokio::spawn(dispatcher.run());
        info!("Runtime started");

        Ok(RuntimeHandle {
            command_sender,
            internal_sender,
            notifications,
            state: state_receiver,
            task: Some(task),
        })
    }
}

// ----------------------------------------------------------------------------
// Runtime Handle
// ----------------------------------------------------------------------------

/// Presentation-side handle: commands in, ordered notifications out
pub struct RuntimeHandle {
    command_sender: mpsc::Sender<UserCommand>,
    internal_sender: mpsc::Sender<InternalInput>,
    notifications: broadcast::Sender<Notification>,
    state: watch::Receiver<ConnectionState>,
    task: Option<JoinHandle<()>>,
}

impl RuntimeHandle {
    pub async fn connect(&self, peer: PeerId) -> UartResult<()> {
        self.send_command(UserCommand::Connect(peer)).await
    }

    pub async fn disconnect(&self) -> UartResult<()> {
        self.send_command(UserCommand::Disconnect).await
    }

    pub async fn send(&self, data: impl Into<Vec<u8>>) -> UartResult<()> {
        self.send_command(UserCommand::Send(data.into())).await
    }

    pub async fn set_transport_enabled(&self, enabled: bool) -> UartResult<()> {
        self.send_command(UserCommand::SetTransportEnabled(enabled))
            .await
    }

    pub async fn send_command(&self, command: UserCommand) -> UartResult<()> {
        self.command_sender
            .send(command)
            .await
            .map_err(|_| UartError::Shutdown)
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Ordered state changes and records from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// All records so far, after every queued command and event is processed
    pub async fn snapshot(&self) -> UartResult<Vec<SessionRecord>> {
        let (reply, response) = oneshot::channel();
        self.internal_sender
            .send(InternalInput::Snapshot(reply))
            .await
            .map_err(|_| UartError::Shutdown)?;
        response.await.map_err(|_| UartError::Shutdown)
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Cancel pending timers, release the transport and stop dispatching
    pub async fn shutdown(&mut self) -> UartResult<()> {
        let Some(task) = self.task.take() else {
            return Err(UartError::Shutdown);
        };

        let (reply, done) = oneshot::channel();
        if self
            .internal_sender
            .send(InternalInput::Shutdown(reply))
            .await
            .is_ok()
        {
            let _ = done.await;
        }
        if let Err(e) = task.await {
            warn!("Dispatcher task ended abnormally: {}", e);
        }
        info!("Runtime shut down");
        Ok(())
    }
}
