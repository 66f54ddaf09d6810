//! Local text-extraction tier
//!
//! Pulls plain text out of the document so the heuristic parser can run
//! without any network round trip. PDFs and text files are handled natively;
//! scanned images need an injected OCR engine and otherwise fail the tier.

use async_trait::async_trait;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

/// Extracts raw text from document bytes
///
/// An `Err` is a tier failure, not a pipeline failure: the orchestrator
/// falls through to the remote tier.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8], mime: &str) -> Result<String, String>;
}

/// Built-in extractor: PDFs and text natively, images via an optional engine
#[derive(Default)]
pub struct NativeTextExtractor {
    image_ocr: Option<Arc<dyn TextExtractor>>,
}

impl NativeTextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delegate image inputs to an external OCR engine
    pub fn with_image_ocr(engine: Arc<dyn TextExtractor>) -> Self {
        Self {
            image_ocr: Some(engine),
        }
    }
}

#[async_trait]
impl TextExtractor for NativeTextExtractor {
    async fn extract(&self, bytes: &[u8], mime: &str) -> Result<String, String> {
        if mime == "application/pdf" {
            return pdf_text(bytes);
        }

        if mime.starts_with("text/") {
            return Ok(String::from_utf8_lossy(bytes).into_owned());
        }

        if mime.starts_with("image/") {
            return match &self.image_ocr {
                Some(engine) => engine.extract(bytes, mime).await,
                None => Err("No OCR engine configured for image input".to_string()),
            };
        }

        Err(format!("No text extraction available for {}", mime))
    }
}

/// Extract text from PDF bytes
///
/// `pdf-extract` panics on some malformed files; a panic here is an
/// extraction failure, not a crash.
pub(crate) fn pdf_text(bytes: &[u8]) -> Result<String, String> {
    let result = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)));

    match result {
        Ok(Ok(text)) => {
            debug!("[TextExtractor] Extracted {} chars from PDF", text.len());
            Ok(text)
        }
        Ok(Err(e)) => Err(format!("PDF text extraction failed: {}", e)),
        Err(_) => Err("PDF text extraction panicked on malformed input".to_string()),
    }
}
