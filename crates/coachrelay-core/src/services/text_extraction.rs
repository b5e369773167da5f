//! Document text extraction dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::ports::{DocumentParserPort, ExtractionMethod};

/// Upload payload for text extraction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractionInput {
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub data_base64: Option<String>,
}

/// Extraction result returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedText {
    pub text: String,
    pub method: ExtractionMethod,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("missing dataBase64")]
    MissingData,

    #[error("dataBase64 is not valid base64: {0}")]
    InvalidBase64(String),
}

impl ExtractError {
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MissingData => "missing_data",
            Self::InvalidBase64(_) => "invalid_base64",
        }
    }

    #[must_use]
    pub const fn suggested_status_code(&self) -> u16 {
        400
    }
}

/// Routes uploads to registered format parsers.
///
/// Plain text and the binary fallback are built in. A method with no parser
/// registered, or whose parser fails, degrades to lossy UTF-8.
#[derive(Default, Clone)]
pub struct TextExtractionService {
    parsers: HashMap<ExtractionMethod, Arc<dyn DocumentParserPort>>,
}

impl std::fmt::Debug for TextExtractionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextExtractionService")
            .field("parsers", &self.parsers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TextExtractionService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parser under the method it reports.
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn DocumentParserPort>) -> Self {
        self.parsers.insert(parser.method(), parser);
        self
    }

    #[must_use]
    pub fn has_parser(&self, method: ExtractionMethod) -> bool {
        self.parsers.contains_key(&method)
    }

    pub async fn extract(&self, input: &ExtractionInput) -> Result<ExtractedText, ExtractError> {
        let started = Instant::now();
        let file_name = input.file_name.as_deref().unwrap_or_default();
        let mime_type = input.mime_type.as_deref().unwrap_or_default();

        let data = input
            .data_base64
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or(ExtractError::MissingData)?;
        let bytes = decode_base64(data)?;

        let method = detect_method(file_name, mime_type);
        let result = match method {
            ExtractionMethod::PlainText | ExtractionMethod::BinaryUtf8 => ExtractedText {
                text: String::from_utf8_lossy(&bytes).into_owned(),
                method,
            },
            _ => self.parse_with_fallback(method, &bytes).await,
        };

        info!(
            method = %result.method,
            file_name,
            mime_type,
            size = bytes.len(),
            text_len = result.text.chars().count(),
            elapsed_ms = whole_millis(started.elapsed()),
            "Extracted document text"
        );
        Ok(result)
    }

    async fn parse_with_fallback(&self, method: ExtractionMethod, bytes: &[u8]) -> ExtractedText {
        let Some(parser) = self.parsers.get(&method) else {
            warn!(%method, "No parser registered, falling back to binary-utf8");
            return binary_fallback(bytes);
        };

        match parser.extract(bytes).await {
            Ok(text) => ExtractedText {
                text: text.trim().to_string(),
                method,
            },
            Err(e) => {
                warn!(%method, error = %e, "Parser failed, falling back to binary-utf8");
                binary_fallback(bytes)
            }
        }
    }
}

/// Pick an extraction method from the MIME type and file name.
#[must_use]
pub fn detect_method(file_name: &str, mime_type: &str) -> ExtractionMethod {
    let name = file_name.to_ascii_lowercase();
    let mime = mime_type.to_ascii_lowercase();
    let extension = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();

    if mime.starts_with("text/") || extension == "txt" {
        ExtractionMethod::PlainText
    } else if mime.starts_with("image/")
        || matches!(extension, "png" | "jpg" | "jpeg" | "bmp" | "tif" | "tiff")
    {
        ExtractionMethod::OcrImage
    } else if extension == "docx" || mime.contains("officedocument.wordprocessingml.document") {
        ExtractionMethod::Docx
    } else if extension == "doc" || mime.contains("msword") {
        ExtractionMethod::Doc
    } else if extension == "pdf" || mime.contains("pdf") {
        ExtractionMethod::Pdf
    } else {
        ExtractionMethod::BinaryUtf8
    }
}

// Accepts bare base64 or a `data:<mime>;base64,` URL, ignoring whitespace.
fn decode_base64(data: &str) -> Result<Vec<u8>, ExtractError> {
    let payload = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ExtractError::InvalidBase64(e.to_string()))
}

/// Milliseconds for logging, saturating instead of truncating.
fn whole_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

fn binary_fallback(bytes: &[u8]) -> ExtractedText {
    ExtractedText {
        text: String::from_utf8_lossy(bytes).into_owned(),
        method: ExtractionMethod::BinaryUtf8,
    }
}
