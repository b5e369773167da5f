//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// Streaming chat-completion relay.
#[derive(Parser)]
#[command(name = "coachrelay")]
#[command(about = "Relay chat completions to an upstream API with heartbeated streaming")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output (ignored when RUST_LOG is set)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
