#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod error;
pub mod ports;
pub mod services;
pub mod settings;
pub mod taxonomy;

// Re-export commonly used types for convenience
pub use domain::{
    ChatMessage, ChatRequest, ChatRole, DEFAULT_MODEL, DEFAULT_TEMPERATURE, RequestDefaults,
    UpstreamChatBody,
};
pub use error::{ErrorKind, RelayError};
pub use ports::{
    DocumentParseError, DocumentParserPort, ExtractionMethod, UpstreamByteStream, UpstreamCall,
    UpstreamFailure, UpstreamPort, UpstreamReply, UpstreamStreamError,
};
pub use services::{
    ExtractError, ExtractedText, ExtractionInput, TaxonomyService, TextExtractionService,
};
pub use settings::{
    API_KEY_ENV, ApiKey, DEFAULT_UPSTREAM_URL, DeploymentProfile, HeartbeatStyle, RelaySettings,
    SettingsError, SettingsOverrides,
};
pub use taxonomy::{TaxonomyKind, TaxonomyListing, TaxonomySource};
