//! Bounded audit log of past analysis outcomes
//!
//! A ring buffer capped at a fixed number of entries; the oldest entry is
//! dropped once the cap is reached. Owned by the local client/session, like
//! the result cache.

use crate::types::{AnalysisSource, DocType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One completed analysis, as remembered by the audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Content fingerprint of the analyzed bytes (hex digest)
    pub hash: String,
    pub doc_type: DocType,
    pub source: AnalysisSource,
    pub saved_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// Ring buffer of analysis outcomes
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(256))),
            capacity,
        }
    }

    /// Append an entry, dropping the oldest once at capacity
    ///
    /// A zero-capacity log keeps nothing.
    pub fn record(&self, entry: AuditEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Snapshot of all entries, oldest first
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_AUDIT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: u64) -> AuditEntry {
        AuditEntry {
            hash: format!("{:064x}", n),
            doc_type: DocType::Income,
            source: AnalysisSource::Ocr,
            saved_at: Utc::now(),
            size_bytes: Some(n),
        }
    }

    #[test]
    fn test_append_and_order() {
        let log = AuditLog::new(10);
        log.record(entry(1));
        log.record(entry(2));
        log.record(entry(3));

        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].size_bytes, Some(1)); // oldest first
        assert_eq!(entries[2].size_bytes, Some(3));
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let log = AuditLog::new(200);
        for n in 0..250 {
            log.record(entry(n));
        }

        let entries = log.entries();
        assert_eq!(entries.len(), 200);
        // Exactly the 200 most recent remain, oldest first
        assert_eq!(entries[0].size_bytes, Some(50));
        assert_eq!(entries[199].size_bytes, Some(249));
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let log = AuditLog::new(0);
        // Must return, not spin, and record nothing
        log.record(entry(1));
        log.record(entry(2));
        assert!(log.is_empty());
    }

    #[test]
    fn test_clear() {
        let log = AuditLog::new(10);
        log.record(entry(1));
        log.clear();
        assert!(log.is_empty());
    }
}
