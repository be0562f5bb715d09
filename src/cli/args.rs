//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// ScribeFleet - chat-driven transcription on ephemeral workers
#[derive(Parser, Debug)]
#[command(name = "scribe-fleet")]
#[command(version)]
#[command(about = "Chat-driven transcription service orchestrating ephemeral transcription workers")]
#[command(long_about = None)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Bot token for the chat transport
    #[arg(long, env = "SCRIBE_FLEET_BOT_TOKEN", hide_env_values = true)]
    pub bot_token: Option<String>,

    /// Fixed worker address for development (disables provisioning,
    /// leftover cleanup, and the cache warmer)
    #[arg(long, env = "SCRIBE_FLEET_WORKER_ADDRESS", value_name = "ADDR")]
    pub worker_address: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Print the effective configuration
    Show,
    /// Show config file path
    Path,
}
