//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Data directory for the transcript and the remembered peer
    #[arg(short, long)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive console
    Chat {
        /// Connect to this peer instead of the remembered one
        #[arg(short, long)]
        peer: Option<String>,
        /// Do not reconnect to the remembered peer at startup
        #[arg(long)]
        no_autoconnect: bool,
    },
    /// Show the remembered peer and the transcript location
    Status,
    /// Forget the remembered peer
    Forget,
    /// Print an example configuration file
    ExampleConfig,
}
