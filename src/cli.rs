use clap::{Parser, Subcommand};

/// isu-engine — per-room incremental currency game engine
#[derive(Parser)]
#[command(name = "isu-engine", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the game server (default if no subcommand is given)
    Serve {
        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Reset all rooms: truncate the purchase ledger and room-time history,
    /// then drop and re-run migrations against a fresh schema.
    Initialize,
}
