//! Domain types for the chat relay.
//!
//! Everything here is request-scoped; nothing is persisted.

mod chat;

pub use chat::{
    ChatMessage, ChatRequest, ChatRole, DEFAULT_MODEL, DEFAULT_TEMPERATURE, RequestDefaults,
    UpstreamChatBody,
};
