//! Connection Supervisor
//!
//! Owns the connection lifecycle of the single peer:
//! - connection state, current peer and the pending disconnect cause
//! - the retry timer slot and the reconnect policy
//! - classification of disconnects as requested or unexpected
//!
//! The supervisor performs no I/O. Each input returns the list of [`Effect`]s
//! the dispatcher must carry out, in order. This keeps every transition
//! synchronous and lets the dispatcher stay the only place that touches the
//! transport, timers and the session log.

use std::time::Duration;

use uartlink_core::{
    ConnectionState, PeerId, RecordKind, SupervisorConfig, TransportEvent, UserCommand,
};

use crate::retry::{RetryTimer, RetryToken};

use tracing::{debug, info, warn};

// ----------------------------------------------------------------------------
// Effects and Inputs
// ----------------------------------------------------------------------------

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Connect(PeerId),
    Disconnect,
    Close,
    /// Write the payload; on success echo it to the transcript as `Sent`
    Write { data: Vec<u8>, echo: String },
    EnableNotifications,
    SaveLastPeer(PeerId),
    ArmRetry { token: RetryToken, delay: Duration },
    CancelRetry,
    Record { kind: RecordKind, text: String, persist: bool },
    StateChanged(ConnectionState),
}

/// Inputs processed after startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorInput {
    Transport(TransportEvent),
    Command(UserCommand),
    RetryFired(RetryToken),
}

/// Why the supervisor itself asked for the current link to go down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectCause {
    User,
    Unsupported,
}

// ----------------------------------------------------------------------------
// Connection Supervisor
// ----------------------------------------------------------------------------

#[derive(Debug)]
pub struct ConnectionSupervisor {
    config: SupervisorConfig,
    state: ConnectionState,
    current_peer: Option<PeerId>,
    /// Consumed by the next `Disconnected` event
    pending: Option<DisconnectCause>,
    /// Whether a link to `current_peer` should be kept up
    wants_link: bool,
    transport_enabled: bool,
    retry: RetryTimer,
    /// Failed attempts in the current outage, drives backoff
    attempts: u32,
    shut_down: bool,
}

impl ConnectionSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            current_peer: None,
            pending: None,
            wants_link: false,
            transport_enabled: true,
            retry: RetryTimer::new(),
            attempts: 0,
            shut_down: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn current_peer(&self) -> Option<&PeerId> {
        self.current_peer.as_ref()
    }

    pub fn pending_cause(&self) -> Option<DisconnectCause> {
        self.pending
    }

    pub fn retry_armed(&self) -> bool {
        self.retry.is_armed()
    }

    /// Token of the outstanding retry, if any
    pub fn live_retry(&self) -> Option<RetryToken> {
        self.retry.armed()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Initial transition with the peer remembered by the directory
    pub fn start(&mut self, last_peer: Option<PeerId>, transport_enabled: bool) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.transport_enabled = transport_enabled;

        let Some(peer) = last_peer else {
            debug!("No remembered peer, waiting for a connect command");
            return effects;
        };

        info!("Remembered peer: {}", peer);
        self.current_peer = Some(peer.clone());
        if !self.config.autoconnect {
            return effects;
        }

        self.wants_link = true;
        if self.transport_enabled {
            self.begin_attempt(peer, &mut effects);
        } else {
            info!("Transport disabled, autoconnect deferred until it is enabled");
        }
        effects
    }

    pub fn handle(&mut self, input: SupervisorInput) -> Vec<Effect> {
        if self.shut_down {
            debug!("Ignoring {:?} after shutdown", input);
            return Vec::new();
        }

        let mut effects = Vec::new();
        match input {
            SupervisorInput::Transport(event) => self.on_transport_event(event, &mut effects),
            SupervisorInput::Command(command) => self.on_command(command, &mut effects),
            SupervisorInput::RetryFired(token) => self.on_retry_fired(token, &mut effects),
        }
        effects
    }

    /// Terminal transition: cancel the timer and release the transport
    pub fn shutdown(&mut self) -> Vec<Effect> {
        if self.shut_down {
            return Vec::new();
        }
        self.shut_down = true;
        self.wants_link = false;

        let mut effects = Vec::new();
        self.cancel_retry(&mut effects);
        effects.push(Effect::Close);
        effects
    }

    // ------------------------------------------------------------------------
    // Transport events
    // ------------------------------------------------------------------------

    fn on_transport_event(&mut self, event: TransportEvent, effects: &mut Vec<Effect>) {
        match event {
            TransportEvent::Connected => self.on_connected(effects),
            TransportEvent::Disconnected => self.on_disconnected(effects),
            TransportEvent::ServicesReady => {
                if self.state.is_connected() {
                    effects.push(Effect::EnableNotifications);
                } else {
                    debug!("Services ready while {}, ignoring", self.state);
                }
            }
            TransportEvent::DataReceived(data) => self.on_data(data, effects),
            TransportEvent::UnsupportedPeer => {
                if self.state == ConnectionState::Disconnected {
                    debug!("Unsupported-peer report without a link, ignoring");
                    return;
                }
                warn!("Peer {} does not support UART, disconnecting", self.peer_label());
                record(effects, RecordKind::Info, "unsupported peer, disconnecting");
                self.pending = Some(DisconnectCause::Unsupported);
                self.wants_link = false;
                self.cancel_retry(effects);
                effects.push(Effect::Disconnect);
            }
            TransportEvent::AdapterStateChanged { enabled } => {
                self.set_transport_enabled(enabled, effects)
            }
        }
    }

    fn on_connected(&mut self, effects: &mut Vec<Effect>) {
        match self.state {
            ConnectionState::Connected => {
                debug!("Duplicate Connected event ignored");
            }
            ConnectionState::Disconnected if self.pending.is_some() => {
                // The link came up after we gave up on it
                debug!("Late link after a requested disconnect, tearing it down");
                effects.push(Effect::Disconnect);
            }
            ConnectionState::Connecting | ConnectionState::Disconnected => {
                self.cancel_retry(effects);
                self.attempts = 0;
                if self.current_peer.is_some() {
                    self.wants_link = true;
                }
                self.set_state(ConnectionState::Connected, effects);
                info!("Connected to {}", self.peer_label());
                record(effects, RecordKind::Connected, self.peer_label());
            }
        }
    }

    fn on_disconnected(&mut self, effects: &mut Vec<Effect>) {
        let was = self.state;
        effects.push(Effect::Close);

        if was != ConnectionState::Disconnected {
            self.set_state(ConnectionState::Disconnected, effects);
            record(effects, RecordKind::Disconnected, self.peer_label());
        }

        match self.pending.take() {
            Some(cause) => {
                info!("Disconnected from {} ({:?}), not retrying", self.peer_label(), cause);
                self.cancel_retry(effects);
            }
            None if was != ConnectionState::Disconnected => {
                if self.wants_link && self.current_peer.is_some() && self.transport_enabled {
                    warn!("Unexpected disconnect from {}, scheduling reconnect", self.peer_label());
                    let delay = self.config.reconnect_delay();
                    self.arm_retry(delay, effects);
                } else if self.wants_link {
                    info!(
                        "Disconnected from {}, reconnect waits for the transport",
                        self.peer_label()
                    );
                } else {
                    info!("Disconnected from {}", self.peer_label());
                }
            }
            None => debug!("Duplicate Disconnected event"),
        }
    }

    fn on_data(&mut self, data: Vec<u8>, effects: &mut Vec<Effect>) {
        match String::from_utf8(data) {
            Ok(text) => record(effects, RecordKind::Received, text),
            Err(e) => {
                let bytes = e.into_bytes();
                warn!("Received {} bytes that are not valid UTF-8", bytes.len());
                record(
                    effects,
                    RecordKind::Info,
                    format!(
                        "undecodable payload ({} bytes): {}",
                        bytes.len(),
                        hex::encode(&bytes)
                    ),
                );
            }
        }
    }

    // ------------------------------------------------------------------------
    // User commands
    // ------------------------------------------------------------------------

    fn on_command(&mut self, command: UserCommand, effects: &mut Vec<Effect>) {
        match command {
            UserCommand::Connect(peer) => self.on_user_connect(peer, effects),
            UserCommand::Disconnect => self.on_user_disconnect(effects),
            UserCommand::Send(data) => {
                if self.state.is_connected() {
                    let echo = String::from_utf8_lossy(&data).into_owned();
                    effects.push(Effect::Write { data, echo });
                } else {
                    record(effects, RecordKind::Info, "not connected, message dropped");
                }
            }
            UserCommand::SetTransportEnabled(enabled) => {
                self.set_transport_enabled(enabled, effects)
            }
        }
    }

    fn on_user_connect(&mut self, peer: PeerId, effects: &mut Vec<Effect>) {
        if self.state != ConnectionState::Disconnected {
            record(
                effects,
                RecordKind::Info,
                format!("already {} to {}", self.state.name().to_lowercase(), self.peer_label()),
            );
            return;
        }

        self.pending = None;
        self.wants_link = true;
        self.attempts = 0;
        self.current_peer = Some(peer.clone());
        effects.push(Effect::SaveLastPeer(peer.clone()));

        if self.transport_enabled {
            self.begin_attempt(peer, effects);
        } else {
            self.cancel_retry(effects);
            record(
                effects,
                RecordKind::Info,
                "transport disabled, will connect once it is enabled",
            );
        }
    }

    fn on_user_disconnect(&mut self, effects: &mut Vec<Effect>) {
        self.wants_link = false;
        match self.state {
            ConnectionState::Connected => {
                self.pending = Some(DisconnectCause::User);
                self.cancel_retry(effects);
                effects.push(Effect::Disconnect);
            }
            ConnectionState::Connecting => {
                self.pending = Some(DisconnectCause::User);
                self.cancel_retry(effects);
                effects.push(Effect::Disconnect);
                self.set_state(ConnectionState::Disconnected, effects);
                record(effects, RecordKind::Info, "connection attempt cancelled");
            }
            ConnectionState::Disconnected => {
                if self.cancel_retry(effects) {
                    record(effects, RecordKind::Info, "reconnect cancelled");
                } else {
                    record(effects, RecordKind::Info, "not connected");
                }
            }
        }
    }

    fn set_transport_enabled(&mut self, enabled: bool, effects: &mut Vec<Effect>) {
        if self.transport_enabled == enabled {
            return;
        }
        self.transport_enabled = enabled;

        if enabled {
            record(effects, RecordKind::Info, "transport enabled");
            if self.state != ConnectionState::Connected && self.wants_link {
                if let Some(peer) = self.current_peer.clone() {
                    self.begin_attempt(peer, effects);
                }
            }
        } else {
            self.cancel_retry(effects);
            // No link can come up while disabled, so a requested disconnect is settled
            self.pending = None;
            if self.state == ConnectionState::Connecting {
                self.set_state(ConnectionState::Disconnected, effects);
            }
            record(effects, RecordKind::Info, "transport disabled");
        }
    }

    // ------------------------------------------------------------------------
    // Retry timer
    // ------------------------------------------------------------------------

    fn on_retry_fired(&mut self, token: RetryToken, effects: &mut Vec<Effect>) {
        if !self.retry.fire(token) {
            debug!("Stale retry token {} ignored", token.generation());
            return;
        }
        if self.state.is_connected() || !self.wants_link {
            return;
        }
        let Some(peer) = self.current_peer.clone() else {
            return;
        };
        if !self.transport_enabled {
            debug!("Retry due but transport disabled, waiting");
            return;
        }

        debug!("Not connected, retrying {}", peer);
        self.begin_attempt(peer, effects);
    }

    /// Issue a connect and arm the fallback that re-issues it
    fn begin_attempt(&mut self, peer: PeerId, effects: &mut Vec<Effect>) {
        self.set_state(ConnectionState::Connecting, effects);
        effects.push(Effect::Connect(peer));
        let delay = self.config.retry_delay(self.attempts);
        self.attempts = self.attempts.saturating_add(1);
        self.arm_retry(delay, effects);
    }

    fn arm_retry(&mut self, delay: Duration, effects: &mut Vec<Effect>) {
        let token = self.retry.arm();
        effects.push(Effect::ArmRetry { token, delay });
    }

    fn cancel_retry(&mut self, effects: &mut Vec<Effect>) -> bool {
        let cancelled = self.retry.cancel();
        if cancelled {
            effects.push(Effect::CancelRetry);
        }
        cancelled
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn set_state(&mut self, state: ConnectionState, effects: &mut Vec<Effect>) {
        if self.state != state {
            debug!("Connection state {} -> {}", self.state, state);
            self.state = state;
            effects.push(Effect::StateChanged(state));
        }
    }

    fn peer_label(&self) -> String {
        self.current_peer
            .as_ref()
            .map(|peer| peer.to_string())
            .unwrap_or_else(|| "unknown peer".to_string())
    }
}

fn record(effects: &mut Vec<Effect>, kind: RecordKind, text: impl Into<String>) {
    effects.push(Effect::Record {
        kind,
        text: text.into(),
        persist: true,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> PeerId {
        PeerId::new("AA:BB").unwrap()
    }

    fn event(event: TransportEvent) -> SupervisorInput {
        SupervisorInput::Transport(event)
    }

    fn command(command: UserCommand) -> SupervisorInput {
        SupervisorInput::Command(command)
    }

    fn connected_supervisor() -> ConnectionSupervisor {
        let mut supervisor = ConnectionSupervisor::new(SupervisorConfig::default());
        supervisor.handle(command(UserCommand::Connect(peer())));
        supervisor.handle(event(TransportEvent::Connected));
        assert_eq!(supervisor.state(), ConnectionState::Connected);
        supervisor
    }

    fn armed_token(effects: &[Effect]) -> Option<(RetryToken, Duration)> {
        effects.iter().find_map(|effect| match effect {
            Effect::ArmRetry { token, delay } => Some((*token, *delay)),
            _ => None,
        })
    }

    fn records(effects: &[Effect]) -> Vec<(RecordKind, String)> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Record { kind, text, .. } => Some((*kind, text.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_startup_with_remembered_peer_connects() {
        let mut supervisor = ConnectionSupervisor::new(SupervisorConfig::default());
        let effects = supervisor.start(Some(peer()), true);

        assert_eq!(supervisor.state(), ConnectionState::Connecting);
        assert_eq!(effects[0], Effect::StateChanged(ConnectionState::Connecting));
        assert_eq!(effects[1], Effect::Connect(peer()));
        let (_, delay) = armed_token(&effects).expect("fallback retry armed");
        assert_eq!(delay, Duration::from_secs(10));
        assert!(!effects.contains(&Effect::SaveLastPeer(peer())));
    }

    #[test]
    fn test_startup_with_disabled_transport_waits() {
        let mut supervisor = ConnectionSupervisor::new(SupervisorConfig::default());
        let effects = supervisor.start(Some(peer()), false);

        assert!(effects.is_empty());
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);

        let effects = supervisor.handle(event(TransportEvent::AdapterStateChanged { enabled: true }));
        assert!(effects.contains(&Effect::Connect(peer())));
        assert_eq!(supervisor.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_startup_without_peer_or_autoconnect_is_idle() {
        let mut supervisor = ConnectionSupervisor::new(SupervisorConfig::default());
        assert!(supervisor.start(None, true).is_empty());

        let mut manual =
            ConnectionSupervisor::new(SupervisorConfig::default().with_autoconnect(false));
        assert!(manual.start(Some(peer()), true).is_empty());
        assert_eq!(manual.current_peer(), Some(&peer()));
    }

    #[test]
    fn test_user_connect_persists_peer_and_connects() {
        let mut supervisor = ConnectionSupervisor::new(SupervisorConfig::default());
        let effects = supervisor.handle(command(UserCommand::Connect(peer())));

        assert_eq!(effects[0], Effect::SaveLastPeer(peer()));
        assert!(effects.contains(&Effect::Connect(peer())));
        assert_eq!(supervisor.state(), ConnectionState::Connecting);

        let again = supervisor.handle(command(UserCommand::Connect(peer())));
        assert!(!again.contains(&Effect::Connect(peer())));
        assert_eq!(records(&again)[0].0, RecordKind::Info);
    }

    #[test]
    fn test_connected_records_once_and_clears_retry() {
        let mut supervisor = ConnectionSupervisor::new(SupervisorConfig::default());
        supervisor.handle(command(UserCommand::Connect(peer())));
        assert!(supervisor.retry_armed());

        let effects = supervisor.handle(event(TransportEvent::Connected));
        assert!(effects.contains(&Effect::CancelRetry));
        assert_eq!(records(&effects), vec![(RecordKind::Connected, "AA:BB".to_string())]);
        assert!(!supervisor.retry_armed());

        // Duplicate Connected is a no-op
        let duplicate = supervisor.handle(event(TransportEvent::Connected));
        assert!(duplicate.is_empty());
        assert_eq!(supervisor.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_services_ready_then_data() {
        let mut supervisor = connected_supervisor();

        let effects = supervisor.handle(event(TransportEvent::ServicesReady));
        assert_eq!(effects, vec![Effect::EnableNotifications]);

        let effects = supervisor.handle(event(TransportEvent::DataReceived(b"hi".to_vec())));
        assert_eq!(records(&effects), vec![(RecordKind::Received, "hi".to_string())]);
    }

    #[test]
    fn test_services_ready_without_link_is_ignored() {
        let mut supervisor = ConnectionSupervisor::new(SupervisorConfig::default());
        assert!(supervisor.handle(event(TransportEvent::ServicesReady)).is_empty());
    }

    #[test]
    fn test_undecodable_payload_is_info_only() {
        let mut supervisor = connected_supervisor();
        let effects = supervisor.handle(event(TransportEvent::DataReceived(vec![0xff, 0xfe])));

        assert_eq!(
            records(&effects),
            vec![(RecordKind::Info, "undecodable payload (2 bytes): fffe".to_string())]
        );
        assert_eq!(supervisor.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_user_disconnect_never_retries() {
        let mut supervisor = connected_supervisor();

        let effects = supervisor.handle(command(UserCommand::Disconnect));
        assert_eq!(effects, vec![Effect::Disconnect]);
        assert_eq!(supervisor.pending_cause(), Some(DisconnectCause::User));

        let effects = supervisor.handle(event(TransportEvent::Disconnected));
        assert!(effects.contains(&Effect::Close));
        assert!(armed_token(&effects).is_none());
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);
        assert_eq!(supervisor.pending_cause(), None);
        assert!(!supervisor.retry_armed());
    }

    #[test]
    fn test_unexpected_disconnect_arms_one_quick_retry() {
        let mut supervisor = connected_supervisor();

        let effects = supervisor.handle(event(TransportEvent::Disconnected));
        assert_eq!(
            &effects[..3],
            &[
                Effect::Close,
                Effect::StateChanged(ConnectionState::Disconnected),
                Effect::Record {
                    kind: RecordKind::Disconnected,
                    text: "AA:BB".to_string(),
                    persist: true,
                },
            ]
        );
        let (token, delay) = armed_token(&effects).expect("retry armed");
        assert_eq!(delay, Duration::from_millis(100));
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);

        let effects = supervisor.handle(SupervisorInput::RetryFired(token));
        assert!(effects.contains(&Effect::Connect(peer())));
        let (_, delay) = armed_token(&effects).expect("fallback rearmed");
        assert_eq!(delay, Duration::from_secs(10));
        assert_eq!(supervisor.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_retry_while_connecting_reissues_connect() {
        let mut supervisor = ConnectionSupervisor::new(SupervisorConfig::default());
        let effects = supervisor.start(Some(peer()), true);
        let (token, _) = armed_token(&effects).unwrap();

        let effects = supervisor.handle(SupervisorInput::RetryFired(token));
        assert!(effects.contains(&Effect::Connect(peer())));
        assert!(armed_token(&effects).is_some());
        assert_eq!(supervisor.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_late_timer_after_reconnect_is_noop() {
        let mut supervisor = ConnectionSupervisor::new(SupervisorConfig::default());
        let effects = supervisor.start(Some(peer()), true);
        let (token, _) = armed_token(&effects).unwrap();

        supervisor.handle(event(TransportEvent::Connected));
        let effects = supervisor.handle(SupervisorInput::RetryFired(token));
        assert!(effects.is_empty());
        assert_eq!(supervisor.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_unsupported_peer_disconnects_without_retry() {
        let mut supervisor = connected_supervisor();

        let effects = supervisor.handle(event(TransportEvent::UnsupportedPeer));
        assert_eq!(
            records(&effects),
            vec![(RecordKind::Info, "unsupported peer, disconnecting".to_string())]
        );
        assert!(effects.contains(&Effect::Disconnect));

        let effects = supervisor.handle(event(TransportEvent::Disconnected));
        assert!(armed_token(&effects).is_none());
        assert!(!supervisor.retry_armed());
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_user_disconnect_while_connecting_cancels_attempt() {
        let mut supervisor = ConnectionSupervisor::new(SupervisorConfig::default());
        supervisor.handle(command(UserCommand::Connect(peer())));

        let effects = supervisor.handle(command(UserCommand::Disconnect));
        assert!(effects.contains(&Effect::CancelRetry));
        assert!(effects.contains(&Effect::Disconnect));
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);

        // A link that still comes up is torn down again
        let effects = supervisor.handle(event(TransportEvent::Connected));
        assert_eq!(effects, vec![Effect::Disconnect]);
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);

        supervisor.handle(event(TransportEvent::Disconnected));
        assert_eq!(supervisor.pending_cause(), None);
        assert!(!supervisor.retry_armed());
    }

    #[test]
    fn test_user_disconnect_while_waiting_cancels_reconnect() {
        let mut supervisor = connected_supervisor();
        supervisor.handle(event(TransportEvent::Disconnected));
        assert!(supervisor.retry_armed());

        let effects = supervisor.handle(command(UserCommand::Disconnect));
        assert!(effects.contains(&Effect::CancelRetry));
        assert_eq!(records(&effects), vec![(RecordKind::Info, "reconnect cancelled".to_string())]);
        assert!(!supervisor.retry_armed());
    }

    #[test]
    fn test_new_connect_clears_stale_user_flag() {
        let mut supervisor = ConnectionSupervisor::new(SupervisorConfig::default());
        supervisor.handle(command(UserCommand::Connect(peer())));
        supervisor.handle(command(UserCommand::Disconnect));
        assert_eq!(supervisor.pending_cause(), Some(DisconnectCause::User));

        supervisor.handle(command(UserCommand::Connect(peer())));
        assert_eq!(supervisor.pending_cause(), None);
        supervisor.handle(event(TransportEvent::Connected));

        let effects = supervisor.handle(event(TransportEvent::Disconnected));
        assert!(armed_token(&effects).is_some(), "drop after a fresh connect is unexpected");
    }

    #[test]
    fn test_send_requires_link() {
        let mut supervisor = ConnectionSupervisor::new(SupervisorConfig::default());
        let effects = supervisor.handle(command(UserCommand::Send(b"hello".to_vec())));
        assert_eq!(
            records(&effects),
            vec![(RecordKind::Info, "not connected, message dropped".to_string())]
        );

        let mut supervisor = connected_supervisor();
        let effects = supervisor.handle(command(UserCommand::Send(b"hello".to_vec())));
        assert_eq!(
            effects,
            vec![Effect::Write {
                data: b"hello".to_vec(),
                echo: "hello".to_string()
            }]
        );
    }

    #[test]
    fn test_disabled_transport_suspends_retries() {
        let mut supervisor = connected_supervisor();
        let effects = supervisor.handle(event(TransportEvent::Disconnected));
        let (token, _) = armed_token(&effects).unwrap();

        let effects = supervisor.handle(command(UserCommand::SetTransportEnabled(false)));
        assert!(effects.contains(&Effect::CancelRetry));
        assert!(supervisor.handle(SupervisorInput::RetryFired(token)).is_empty());

        let effects = supervisor.handle(command(UserCommand::SetTransportEnabled(true)));
        assert!(effects.contains(&Effect::Connect(peer())));
        assert!(supervisor.retry_armed());
    }

    #[test]
    fn test_drop_while_transport_disabled_waits_for_enable() {
        let mut supervisor = connected_supervisor();
        supervisor.handle(command(UserCommand::SetTransportEnabled(false)));
        assert_eq!(supervisor.state(), ConnectionState::Connected);

        // Powering the adapter off takes the link down right after
        let effects = supervisor.handle(event(TransportEvent::Disconnected));
        assert!(armed_token(&effects).is_none());
        assert!(!supervisor.retry_armed());
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);

        let effects = supervisor.handle(command(UserCommand::SetTransportEnabled(true)));
        assert!(effects.contains(&Effect::Connect(peer())));
        assert!(supervisor.retry_armed());
        assert_eq!(supervisor.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_disable_while_connecting_falls_back_to_disconnected() {
        let mut supervisor = ConnectionSupervisor::new(SupervisorConfig::default());
        supervisor.start(Some(peer()), true);
        assert_eq!(supervisor.state(), ConnectionState::Connecting);

        let effects = supervisor.handle(event(TransportEvent::AdapterStateChanged { enabled: false }));
        assert_eq!(
            effects,
            vec![
                Effect::CancelRetry,
                Effect::StateChanged(ConnectionState::Disconnected),
                Effect::Record {
                    kind: RecordKind::Info,
                    text: "transport disabled".to_string(),
                    persist: true,
                },
            ]
        );
        assert!(!supervisor.retry_armed());

        let effects = supervisor.handle(event(TransportEvent::AdapterStateChanged { enabled: true }));
        assert!(effects.contains(&Effect::Connect(peer())));
        assert_eq!(supervisor.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_disable_settles_cancelled_attempt() {
        let mut supervisor = ConnectionSupervisor::new(SupervisorConfig::default());
        supervisor.handle(command(UserCommand::Connect(peer())));
        supervisor.handle(command(UserCommand::Disconnect));
        assert_eq!(supervisor.pending_cause(), Some(DisconnectCause::User));

        supervisor.handle(command(UserCommand::SetTransportEnabled(false)));
        assert_eq!(supervisor.pending_cause(), None);

        let effects = supervisor.handle(command(UserCommand::SetTransportEnabled(true)));
        assert!(!effects.contains(&Effect::Connect(peer())));
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);
        assert_eq!(supervisor.pending_cause(), None);
    }

    #[test]
    fn test_cancelled_attempt_report_consumes_user_cause() {
        let mut supervisor = ConnectionSupervisor::new(SupervisorConfig::default());
        supervisor.handle(command(UserCommand::Connect(peer())));
        supervisor.handle(command(UserCommand::Disconnect));

        // The transport answers a cancelled attempt with Disconnected
        let effects = supervisor.handle(event(TransportEvent::Disconnected));
        assert_eq!(effects, vec![Effect::Close]);
        assert_eq!(supervisor.pending_cause(), None);
        assert!(!supervisor.retry_armed());
    }

    #[test]
    fn test_shutdown_is_terminal() {
        let mut supervisor = ConnectionSupervisor::new(SupervisorConfig::default());
        supervisor.start(Some(peer()), true);

        let effects = supervisor.shutdown();
        assert_eq!(effects, vec![Effect::CancelRetry, Effect::Close]);
        assert!(supervisor.is_shut_down());
        assert!(supervisor.handle(event(TransportEvent::Connected)).is_empty());
        assert!(supervisor.shutdown().is_empty());
    }

    #[test]
    fn test_backoff_grows_across_failed_attempts() {
        let config = SupervisorConfig::new()
            .with_retry_interval(Duration::from_secs(1))
            .with_backoff(2.0, Duration::from_secs(3));
        let mut supervisor = ConnectionSupervisor::new(config);

        let mut effects = supervisor.start(Some(peer()), true);
        let mut delays = Vec::new();
        for _ in 0..4 {
            let (token, delay) = armed_token(&effects).unwrap();
            delays.push(delay);
            effects = supervisor.handle(SupervisorInput::RetryFired(token));
        }
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3),
                Duration::from_secs(3)
            ]
        );
    }
}
