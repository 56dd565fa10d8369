use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "clubsync", about = "Conversation sync engine for the club portal")]
pub struct Cli {
    /// Path to config file (default: ./config.toml, then the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Bearer ID token for the write API
    #[arg(long, global = true, env = "CLUBSYNC_ID_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the sync engine against the seeded in-memory backend
    Demo,
    /// Send a message to a conversation through the write API
    Send {
        #[arg(long)]
        conversation: String,
        content: String,
    },
    /// Start (or reopen) a conversation with a mentor through the write API
    Start {
        #[arg(long)]
        recipient: String,
    },
}

impl Cli {
    pub fn command_or_default(&self) -> Command {
        self.command.clone().unwrap_or(Command::Demo)
    }
}
