#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod cors;
pub mod error;
pub mod framing;
pub mod handlers;
pub mod relay;
pub mod server;
pub mod upstream;

pub use error::HttpError;
pub use relay::RelayController;
pub use server::{AppState, ChatRelays, build_state, create_router, serve};
pub use upstream::HttpUpstream;
