//! HTTP request handlers.
//!
//! Handlers are thin wrappers that delegate to the relay controllers and
//! core services held in `AppState`.

pub mod chat;
pub mod extract;
pub mod health;
pub mod taxonomy;
