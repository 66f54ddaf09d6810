//! Content-addressed result cache
//!
//! Maps `(fingerprint, docType)` to a prior analysis result so re-analyzing
//! byte-identical content never re-runs any tier. At most one record exists
//! per key; last write wins. Records older than the TTL are dropped
//! opportunistically on every read and the pruned set is persisted.
//!
//! Scope: local to one client/session. A hit on one device does not prevent
//! redundant work on another device for the same physical document.

mod store;

pub use store::{CacheStore, JsonFileCacheStore, MemoryCacheStore};

use crate::config::DEFAULT_CACHE_TTL_DAYS;
use crate::types::{AnalysisSource, DocType, DocumentData};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// One cached analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    /// Content fingerprint (hex digest)
    pub hash: String,
    pub doc_type: DocType,
    /// Epoch milliseconds
    pub saved_at: i64,
    pub source: AnalysisSource,
    pub payload: DocumentData,
}

/// TTL-pruned result cache over a swappable backing store
///
/// Storage failures degrade to cache-miss / no-op with a warning; the
/// pipeline keeps working without a cache.
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    ttl_ms: i64,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl_days: i64) -> Self {
        Self {
            store,
            ttl_ms: ttl_days * 24 * 60 * 60 * 1000,
        }
    }

    pub fn with_default_ttl(store: Arc<dyn CacheStore>) -> Self {
        Self::new(store, DEFAULT_CACHE_TTL_DAYS)
    }

    /// Look up a record, pruning expired entries as a side effect
    pub fn get(&self, hash: &str, doc_type: DocType) -> Option<CacheRecord> {
        let records = match self.store.load() {
            Ok(records) => records,
            Err(e) => {
                warn!("[ResultCache] Store unavailable, treating as miss: {}", e);
                return None;
            }
        };

        let cutoff = Utc::now().timestamp_millis() - self.ttl_ms;
        let before = records.len();
        let fresh: Vec<CacheRecord> = records
            .into_iter()
            .filter(|r| is_fresh(r.saved_at, cutoff))
            .collect();

        if fresh.len() < before {
            debug!(
                "[ResultCache] Pruned {} expired record(s)",
                before - fresh.len()
            );
            if let Err(e) = self.store.save(&fresh) {
                warn!("[ResultCache] Failed to persist pruned set: {}", e);
            }
        }

        fresh
            .into_iter()
            .find(|r| r.hash == hash && r.doc_type == doc_type)
    }

    /// Insert a record, overwriting any existing record for the same key
    pub fn put(&self, record: CacheRecord) {
        let mut records = match self.store.load() {
            Ok(records) => records,
            Err(e) => {
                warn!("[ResultCache] Store unavailable, dropping write: {}", e);
                return;
            }
        };

        records.retain(|r| !(r.hash == record.hash && r.doc_type == record.doc_type));
        records.push(record);

        if let Err(e) = self.store.save(&records) {
            warn!("[ResultCache] Failed to persist cache: {}", e);
        }
    }

    /// Wipe all cached records
    pub fn clear(&self) {
        if let Err(e) = self.store.clear() {
            warn!("[ResultCache] Failed to clear cache: {}", e);
        }
    }
}

/// A record exactly at the TTL boundary is still fresh; eviction requires
/// strictly exceeding the TTL
fn is_fresh(saved_at: i64, cutoff: i64) -> bool {
    saved_at >= cutoff
}
