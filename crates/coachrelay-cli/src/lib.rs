//! Command-line adapter for coachrelay.
//!
//! Argument parsing and command handlers live here so they can be tested;
//! `main.rs` only wires logging, environment and dispatch.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary target only
use dotenvy as _;
use tracing_subscriber as _;

pub mod commands;
pub mod handlers;
pub mod parser;

pub use commands::{Commands, ServeArgs};
pub use parser::Cli;
