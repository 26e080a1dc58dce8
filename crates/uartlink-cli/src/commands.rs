//! Command handlers for the uartlink CLI

use tracing::info;
use uartlink_core::PeerId;

use crate::app::UartApp;
use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::console::Console;
use crate::error::{CliError, Result};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, app: UartApp) -> Result<()> {
        match cli.command {
            Commands::Chat {
                peer,
                no_autoconnect,
            } => Self::handle_chat_command(app, peer, no_autoconnect).await,
            Commands::Status => Self::handle_status_command(app).await,
            Commands::Forget => app.forget().await,
            Commands::ExampleConfig => {
                print!("{}", AppConfig::example_config());
                Ok(())
            }
        }
    }

    async fn handle_chat_command(
        app: UartApp,
        peer: Option<String>,
        no_autoconnect: bool,
    ) -> Result<()> {
        let target = peer.as_deref().map(Self::parse_peer_id).transpose()?;

        // An explicit peer replaces the remembered one, so skip the startup attempt
        let autoconnect = !no_autoconnect && target.is_none();
        let handle = app.start(autoconnect).await?;

        if let Some(peer) = target {
            info!("Connecting to {}", peer);
            handle.connect(peer).await?;
        }

        Console::new(handle, app.config().console.clone()).run().await
    }

    async fn handle_status_command(app: UartApp) -> Result<()> {
        let report = app.status().await?;
        match &report.last_peer {
            Some(peer) => println!("Remembered peer: {}", peer),
            None => println!("Remembered peer: none"),
        }
        let marker = if report.transcript_exists { "" } else { " (not created yet)" };
        println!("Transcript: {}{}", report.transcript.display(), marker);
        Ok(())
    }

    fn parse_peer_id(value: &str) -> Result<PeerId> {
        value
            .parse::<PeerId>()
            .map_err(|e| CliError::Config(format!("Invalid peer '{}': {}", value, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_peer_id() {
        assert!(CommandDispatcher::parse_peer_id("AA:BB:CC:DD:EE:FF").is_ok());
        assert!(matches!(
            CommandDispatcher::parse_peer_id("  "),
            Err(CliError::Config(_))
        ));
    }
}
