//! uartlink - BLE UART console with automatic reconnect

use clap::Parser;
use tracing::{error, info};

use uartlink_cli::{
    app::UartApp, cli::Cli, commands::CommandDispatcher, config::AppConfig, error::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let mut config = load_configuration(&cli)?;

    // Override data directory if specified
    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = Some(data_dir.into());
    }

    let app = UartApp::new(config);

    if let Err(e) = CommandDispatcher::execute(cli, app).await {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    info!("uartlink exited");
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    if let Some(config_path) = &cli.config {
        info!("Loading configuration from: {}", config_path);
        AppConfig::load_from_file(config_path)
    } else {
        info!("Using default configuration");
        Ok(AppConfig::default())
    }
}
