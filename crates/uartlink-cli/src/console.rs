//! Interactive console
//!
//! Reads lines from stdin and prints the runtime's ordered notifications.
//! Lines starting with `/` are commands; anything else is sent to the peer as
//! UTF-8 text.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uartlink_core::PeerId;
use uartlink_runtime::{Notification, RuntimeHandle};

use crate::config::ConsoleConfig;
use crate::error::Result;

// ----------------------------------------------------------------------------
// Console Commands
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Connect(String),
    Disconnect,
    Status,
    Log,
    Help,
    Quit,
    Send(String),
    Empty,
    Unknown(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ConsoleCommand::Empty;
        }
        let Some(command) = trimmed.strip_prefix('/') else {
            return ConsoleCommand::Send(line.trim_end_matches(['\r', '\n']).to_string());
        };

        let mut parts = command.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default().to_lowercase();
        let argument = parts.next().map(str::trim).unwrap_or_default();

        match name.as_str() {
            "connect" | "c" => ConsoleCommand::Connect(argument.to_string()),
            "disconnect" | "d" => ConsoleCommand::Disconnect,
            "status" | "s" => ConsoleCommand::Status,
            "log" | "l" => ConsoleCommand::Log,
            "help" | "h" | "?" => ConsoleCommand::Help,
            "quit" | "q" | "exit" => ConsoleCommand::Quit,
            _ => ConsoleCommand::Unknown(name),
        }
    }
}

const HELP: &str = "\
Commands:
  /connect <peer>  connect to a peer address or name
  /disconnect      disconnect and stop reconnecting
  /status          show the connection state
  /log             print the session transcript
  /quit            leave the console
Any other line is sent to the peer.";

// ----------------------------------------------------------------------------
// Console Loop
// ----------------------------------------------------------------------------

pub struct Console {
    handle: RuntimeHandle,
    notifications: broadcast::Receiver<Notification>,
    config: ConsoleConfig,
}

impl Console {
    pub fn new(handle: RuntimeHandle, config: ConsoleConfig) -> Self {
        let notifications = handle.subscribe();
        Self {
            handle,
            notifications,
            config,
        }
    }

    pub fn handle(&self) -> &RuntimeHandle {
        &self.handle
    }

    /// Run until `/quit` or end of input, then shut the runtime down
    pub async fn run(mut self) -> Result<()> {
        println!("{}", HELP);
        println!("State: {}", self.handle.state());

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            if !self.process_line(&line).await? {
                                break;
                            }
                        }
                        None => {
                            debug!("End of input");
                            break;
                        }
                    }
                }

                notification = self.notifications.recv() => {
                    match notification {
                        Ok(notification) => self.render(&notification),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Console fell behind, {} notifications skipped (see /log)", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Notification stream closed");
                            break;
                        }
                    }
                }
            }
        }

        self.handle.shutdown().await?;
        Ok(())
    }

    /// Apply one input line; false ends the session
    async fn process_line(&mut self, line: &str) -> Result<bool> {
        match ConsoleCommand::parse(line) {
            ConsoleCommand::Connect(target) => match target.parse::<PeerId>() {
                Ok(peer) => self.handle.connect(peer).await?,
                Err(e) => println!("{}", e),
            },
            ConsoleCommand::Disconnect => self.handle.disconnect().await?,
            ConsoleCommand::Status => println!("State: {}", self.handle.state()),
            ConsoleCommand::Log => {
                for record in self.handle.snapshot().await? {
                    println!("{}", record);
                }
            }
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => return Ok(false),
            ConsoleCommand::Send(text) => self.handle.send(text).await?,
            ConsoleCommand::Empty => {}
            ConsoleCommand::Unknown(name) => println!("Unknown command /{} (try /help)", name),
        }
        Ok(true)
    }

    fn render(&self, notification: &Notification) {
        match notification {
            Notification::Record(record) => println!("{}", record),
            Notification::State(state) if self.config.show_state_changes => {
                println!("{}{}", self.config.prompt, state)
            }
            Notification::State(_) => {}
        }
    }
}
