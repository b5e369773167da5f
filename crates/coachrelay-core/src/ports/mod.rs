//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core domain expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No `reqwest` or `axum` types in any signature
//! - One upstream call per relay session; retries are not part of the contract

pub mod document_parser;
pub mod upstream;

pub use document_parser::{DocumentParseError, DocumentParserPort, ExtractionMethod};
pub use upstream::{
    UpstreamByteStream, UpstreamCall, UpstreamFailure, UpstreamPort, UpstreamReply,
    UpstreamStreamError,
};
