//! Core data types for the analysis pipeline

use serde::{Deserialize, Serialize};

/// Kind of scanned document being analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocType {
    /// Incoming goods transaction (remito in)
    Income,
    /// Outgoing goods transaction (remito out)
    Outcome,
    /// Production control sheet
    Control,
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Income => write!(f, "INCOME"),
            Self::Outcome => write!(f, "OUTCOME"),
            Self::Control => write!(f, "CONTROL"),
        }
    }
}

/// Which tier produced an analysis result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSource {
    Qr,
    Ocr,
    Remote,
}

impl std::fmt::Display for AnalysisSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Qr => write!(f, "qr"),
            Self::Ocr => write!(f, "ocr"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Item classification on transaction documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ItemType {
    Chapa,
    #[default]
    Modulo,
}

/// One structured line item from a transaction document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItem {
    pub name: String,
    pub quantity: u32,
    pub item_type: ItemType,
}

/// One structured row from a production control sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlRow {
    /// Date token as written on the sheet, e.g. `12/05/2024`
    pub date: String,
    pub quantity: u32,
    pub destination: String,
    pub model: String,
}

/// Structured payload produced by any tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DocumentData {
    #[serde(rename_all = "camelCase")]
    Transaction {
        destination: Option<String>,
        items: Vec<TransactionItem>,
    },
    #[serde(rename_all = "camelCase")]
    Control { rows: Vec<ControlRow> },
}

impl DocumentData {
    /// Empty payload matching the document type
    pub fn empty_for(doc_type: DocType) -> Self {
        match doc_type {
            DocType::Income | DocType::Outcome => Self::Transaction {
                destination: None,
                items: Vec::new(),
            },
            DocType::Control => Self::Control { rows: Vec::new() },
        }
    }

    /// An all-empty result is a valid terminal state, not an error
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Transaction { items, .. } => items.is_empty(),
            Self::Control { rows } => rows.is_empty(),
        }
    }
}

/// Metadata of the file that went through the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedFile {
    pub file_name: String,
    pub mime: String,
    pub size_bytes: u64,
}

/// Result of one orchestrator run (transient, not persisted)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub data: DocumentData,
    pub source: AnalysisSource,
    pub from_cache: bool,
    pub used_remote: bool,
    pub processed_file: ProcessedFile,
    /// `data:<mime>;base64,...` preview for image inputs
    pub preview_data_url: Option<String>,
    /// Why the remote tier was skipped, when it was the only tier left.
    /// `QuotaExhausted` here lets the UI say "retry after the reset date"
    /// instead of offering manual entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_skipped: Option<crate::quota::RemoteAvailability>,
}

/// Resolve a MIME type from the file name
pub fn detect_mime(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Check whether a MIME type is accepted by the pipeline
///
/// Scans arrive as images or PDFs; plain-text inputs are accepted for
/// pre-extracted OCR text.
pub fn is_supported_mime(mime: &str) -> bool {
    matches!(
        mime,
        "image/png"
            | "image/jpeg"
            | "image/webp"
            | "image/gif"
            | "image/bmp"
            | "image/tiff"
            | "application/pdf"
            | "text/plain"
            | "text/csv"
            | "text/markdown"
    )
}
