//! Core services.
//!
//! Services orchestrate between ports and domain logic. They don't know
//! about concrete implementations.

mod taxonomy;
mod text_extraction;

pub use taxonomy::TaxonomyService;
pub use text_extraction::{
    ExtractError, ExtractedText, ExtractionInput, TextExtractionService, detect_method,
};
