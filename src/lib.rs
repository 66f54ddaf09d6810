//! remitoscan: tiered analysis of scanned warehouse documents
//!
//! Turns an uploaded remito or control sheet into structured rows through
//! escalating tiers: content-addressed result cache, QR payload decode,
//! local text extraction + heuristic parsing, and finally a quota-gated
//! remote AI call. Cheap local work always runs before the expensive and
//! budget-limited remote tier.
//!
//! Entry point is [`DocumentAnalyzer`]; collaborators (cache store, quota
//! stores, QR decoder, text extractor, remote provider) are injected through
//! its builder so tests and embedders can swap any of them.

pub mod audit;
pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod orchestrator;
pub mod parser;
pub mod quota;
pub mod retry;
pub mod tiers;
pub mod types;

pub use audit::{AuditEntry, AuditLog};
pub use cache::{CacheRecord, CacheStore, JsonFileCacheStore, MemoryCacheStore, ResultCache};
pub use config::{AnalyzerConfig, RemoteConfig};
pub use error::{AnalysisError, RemoteError};
pub use fingerprint::{fingerprint, Fingerprint};
pub use orchestrator::{AnalyzeOptions, DocumentAnalyzer, DocumentAnalyzerBuilder};
pub use quota::{
    MemoryQuotaStore, QuotaLedger, QuotaScope, QuotaSnapshot, QuotaStore, RemoteAvailability,
    SqliteQuotaStore,
};
pub use tiers::ocr::{NativeTextExtractor, TextExtractor};
pub use tiers::qr::{ImageQrDecoder, QrDecoder};
pub use tiers::remote::{HttpRemoteProvider, RemoteProvider};
pub use types::{
    AnalysisOutcome, AnalysisSource, ControlRow, DocType, DocumentData, ItemType, ProcessedFile,
};

use tracing_subscriber::EnvFilter;

/// Initialize tracing with the `RUST_LOG` env filter
///
/// Default: warn for most crates, info for remitoscan. Use `RUST_LOG=debug`
/// for verbose per-tier logs. Call once from the embedding application.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,remitoscan=info")),
        )
        .init();
}
