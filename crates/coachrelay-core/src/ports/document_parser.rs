//! Document parser port.
//!
//! Format parsers (PDF, Word, OCR) are opaque external collaborators. The
//! extraction service dispatches to whichever implementation is registered
//! for a method and falls back to lossy UTF-8 when none is.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// How text was obtained from an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExtractionMethod {
    #[serde(rename = "txt")]
    PlainText,
    #[serde(rename = "ocr-image")]
    OcrImage,
    #[serde(rename = "docx")]
    Docx,
    #[serde(rename = "doc")]
    Doc,
    #[serde(rename = "pdf")]
    Pdf,
    #[serde(rename = "binary-utf8")]
    BinaryUtf8,
}

impl ExtractionMethod {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "txt",
            Self::OcrImage => "ocr-image",
            Self::Docx => "docx",
            Self::Doc => "doc",
            Self::Pdf => "pdf",
            Self::BinaryUtf8 => "binary-utf8",
        }
    }

    /// Methods handled without any registered parser.
    #[must_use]
    pub const fn is_builtin(&self) -> bool {
        matches!(self, Self::PlainText | Self::BinaryUtf8)
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors a document parser can report.
#[derive(Debug, Error)]
pub enum DocumentParseError {
    /// The parser does not handle this document variant.
    #[error("Unsupported document: {0}")]
    Unsupported(String),

    /// The document could not be parsed.
    #[error("Failed to parse document: {0}")]
    Failed(String),
}

/// Port for a single document format parser.
#[async_trait]
pub trait DocumentParserPort: Send + Sync {
    /// The method this parser implements.
    fn method(&self) -> ExtractionMethod;

    /// Extract plain text from the raw document bytes.
    async fn extract(&self, bytes: &[u8]) -> Result<String, DocumentParseError>;
}
