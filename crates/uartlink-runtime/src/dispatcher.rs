//! Event Dispatcher
//!
//! The single serialized context of the runtime. Four producers feed it:
//! user commands, transport events, storage failure reports and internal
//! inputs (retry timer firings, queries). Each item runs to completion, supervisor
//! transition and effect execution included, before the next is taken.
//!
//! The loop polls commands first, then transport events, then storage
//! reports, then internal inputs. A query therefore observes every command and event that was
//! enqueued before it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uartlink_core::{
    ConnectionState, PeerId, RecordKind, SessionRecord, TransportError, TransportEventReceiver,
    TransportFacade, UserCommand,
};

use crate::retry::RetryToken;
use crate::session_log::SessionLog;
use crate::storage::{StorageCommand, StorageReport};
use crate::supervisor::{ConnectionSupervisor, Effect, SupervisorInput};

// ----------------------------------------------------------------------------
// Internal Inputs
// ----------------------------------------------------------------------------

/// Inputs produced inside the runtime
#[derive(Debug)]
pub enum InternalInput {
    RetryFired(RetryToken),
    Snapshot(oneshot::Sender<Vec<SessionRecord>>),
    Shutdown(oneshot::Sender<()>),
}

// ----------------------------------------------------------------------------
// Dispatcher
// ----------------------------------------------------------------------------

pub struct EventDispatcher {
    supervisor: ConnectionSupervisor,
    session_log: SessionLog,
    transport: Arc<dyn TransportFacade>,
    command_receiver: mpsc::Receiver<UserCommand>,
    event_receiver: TransportEventReceiver,
    internal_receiver: mpsc::Receiver<InternalInput>,
    report_receiver: mpsc::UnboundedReceiver<StorageReport>,
    /// Handed to retry timers so their firing re-enters the queue
    internal_sender: mpsc::Sender<InternalInput>,
    storage_sender: Option<mpsc::UnboundedSender<StorageCommand>>,
    storage_handle: Option<JoinHandle<()>>,
    retry_handle: Option<JoinHandle<()>>,
    state_sender: watch::Sender<ConnectionState>,
    running: bool,
}

pub(crate) struct DispatcherParts {
    pub supervisor: ConnectionSupervisor,
    pub session_log: SessionLog,
    pub transport: Arc<dyn TransportFacade>,
    pub command_receiver: mpsc::Receiver<UserCommand>,
    pub event_receiver: TransportEventReceiver,
    pub internal_receiver: mpsc::Receiver<InternalInput>,
    pub report_receiver: mpsc::UnboundedReceiver<StorageReport>,
    pub internal_sender: mpsc::Sender<InternalInput>,
    pub storage_sender: Option<mpsc::UnboundedSender<StorageCommand>>,
    pub storage_handle: Option<JoinHandle<()>>,
    pub state_sender: watch::Sender<ConnectionState>,
}

impl EventDispatcher {
    pub(crate) fn new(parts: DispatcherParts) -> Self {
        Self {
            supervisor: parts.supervisor,
            session_log: parts.session_log,
            transport: parts.transport,
            command_receiver: parts.command_receiver,
            event_receiver: parts.event_receiver,
            internal_receiver: parts.internal_receiver,
            report_receiver: parts.report_receiver,
            internal_sender: parts.internal_sender,
            storage_sender: parts.storage_sender,
            storage_handle: parts.storage_handle,
            retry_handle: None,
            state_sender: parts.state_sender,
            running: true,
        }
    }

    /// Apply the startup transition before the loop begins
    pub(crate) fn start(
        &mut self,
        last_peer: Option<PeerId>,
        transport_enabled: bool,
        notices: Vec<String>,
    ) {
        for notice in notices {
            self.session_log.record(RecordKind::Info, notice, true);
        }
        let effects = self.supervisor.start(last_peer, transport_enabled);
        self.execute(effects);
    }

    /// Run the dispatch loop until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        info!("Event dispatcher starting");

        while self.running {
            tokio::select! {
                biased;

                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => {
                            debug!("Command: {}", command.name());
                            self.dispatch(SupervisorInput::Command(command));
                        }
                        None => {
                            info!("Command channel closed, shutting down");
                            self.teardown().await;
                        }
                    }
                }

                Some(event) = self.event_receiver.recv() => {
                    debug!("Transport event: {}", event.name());
                    self.dispatch(SupervisorInput::Transport(event));
                }

                Some(report) = self.report_receiver.recv() => {
                    self.record_storage_failure(report);
                }

                Some(input) = self.internal_receiver.recv() => {
                    self.process_internal(input).await;
                }
            }
        }

        info!("Event dispatcher stopped");
    }

    fn dispatch(&mut self, input: SupervisorInput) {
        let effects = self.supervisor.handle(input);
        self.execute(effects);
    }

    async fn process_internal(&mut self, input: InternalInput) {
        match input {
            InternalInput::RetryFired(token) => {
                self.dispatch(SupervisorInput::RetryFired(token));
            }
            InternalInput::Snapshot(reply) => {
                let _ = reply.send(self.session_log.snapshot());
            }
            InternalInput::Shutdown(reply) => {
                self.teardown().await;
                let _ = reply.send(());
            }
        }
    }

    fn record_storage_failure(&mut self, report: StorageReport) {
        // Kept out of the transcript so a broken sink cannot feed itself
        self.session_log.record(
            RecordKind::Info,
            format!("{} failed: {}", report.operation, report.reason),
            false,
        );
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Connect(peer) => {
                    info!("Connecting to {}", peer);
                    let result = self.transport.connect(&peer);
                    self.check_transport("connect", result);
                }
                Effect::Disconnect => {
                    let result = self.transport.disconnect();
                    self.check_transport("disconnect", result);
                }
                Effect::Close => {
                    let result = self.transport.close();
                    self.check_transport("close", result);
                }
                Effect::Write { data, echo } => {
                    let result = self.transport.write(&data);
                    if self.check_transport("write", result) {
                        self.session_log.record(RecordKind::Sent, echo, true);
                    }
                }
                Effect::EnableNotifications => {
                    let result = self.transport.enable_notifications();
                    self.check_transport("enable notifications", result);
                }
                Effect::SaveLastPeer(peer) => self.store(StorageCommand::SaveLastPeer(peer)),
                Effect::ArmRetry { token, delay } => self.arm_retry(token, delay),
                Effect::CancelRetry => self.cancel_retry(),
                Effect::Record {
                    kind,
                    text,
                    persist,
                } => self.session_log.record(kind, text, persist),
                Effect::StateChanged(state) => {
                    self.state_sender.send_replace(state);
                    self.session_log.publish_state(state);
                }
            }
        }
    }

    /// Convert a rejected transport command into an `Info` record
    fn check_transport(&mut self, command: &str, result: Result<(), TransportError>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Transport rejected {}: {}", command, e);
                self.session_log.record(
                    RecordKind::Info,
                    format!("transport unavailable: {} dropped ({})", command, e),
                    true,
                );
                false
            }
        }
    }

    fn store(&mut self, command: StorageCommand) {
        let Some(storage) = &self.storage_sender else {
            return;
        };
        if storage.send(command).is_err() {
            warn!("Storage worker gone, dropping storage command");
            self.storage_sender = None;
        }
    }

    fn arm_retry(&mut self, token: RetryToken, delay: Duration) {
        self.cancel_retry();
        debug!("Retry {} armed for {:?}", token.generation(), delay);

        let sender = self.internal_sender.clone();
        self.retry_handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(InternalInput::RetryFired(token)).await;
        }));
    }

    fn cancel_retry(&mut self) {
        if let Some(handle) = self.retry_handle.take() {
            handle.abort();
        }
    }

    async fn teardown(&mut self) {
        if !self.running {
            return;
        }
        info!("Dispatcher teardown");

        let effects = self.supervisor.shutdown();
        self.execute(effects);
        self.cancel_retry();

        // Closing the channel lets the worker drain what is already queued
        self.session_log.detach_storage();
        self.storage_sender = None;
        if let Some(handle) = self.storage_handle.take() {
            if let Err(e) = handle.await {
                warn!("Storage task ended abnormally: {}", e);
            }
        }
        while let Ok(report) = self.report_receiver.try_recv() {
            self.record_storage_failure(report);
        }

        self.command_receiver.close();
        self.event_receiver.close();
        self.running = false;
    }
}
