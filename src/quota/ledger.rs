//! Quota ledger: shared-store-first counters with a local fallback
//!
//! Every access runs the same atomic step: reset-if-expired, apply the
//! optional mutator, clamp `used` into `[0, limit]`, persist. Failures of
//! the shared store fall back to the local store with a warning and are
//! never propagated to the caller.

use super::{current_period, QuotaRecord, QuotaScope, QuotaSnapshot, QuotaStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Mutation applied inside the atomic read-modify-write, e.g. an increment
pub type QuotaMutator<'a> = &'a (dyn Fn(&mut QuotaRecord) + Sync);

/// Per-tenant usage counters over a shared authoritative store
pub struct QuotaLedger {
    shared: Option<Arc<dyn QuotaStore>>,
    local: Arc<dyn QuotaStore>,
}

impl QuotaLedger {
    /// Ledger backed only by a local store
    pub fn new(local: Arc<dyn QuotaStore>) -> Self {
        Self {
            shared: None,
            local,
        }
    }

    /// Ledger with a shared authoritative store and a local fallback
    ///
    /// The fallback is single-device and is never reconciled back into the
    /// shared store after an outage.
    pub fn with_shared(shared: Arc<dyn QuotaStore>, local: Arc<dyn QuotaStore>) -> Self {
        Self {
            shared: Some(shared),
            local,
        }
    }

    /// Read (and optionally mutate) the current record for a scope
    ///
    /// Lazily creates the record on first access for the scope/period. On
    /// store failure the caller still gets a snapshot; a double failure
    /// yields an unpersisted fresh record and an error log, never an `Err`.
    pub async fn ensure_snapshot(
        &self,
        scope: &QuotaScope,
        limit: Option<u32>,
        mutator: Option<QuotaMutator<'_>>,
    ) -> QuotaSnapshot {
        let now = Utc::now();
        let period = current_period(now);
        let key = scope.key_for_period(&period);

        let apply = |existing: Option<QuotaRecord>| -> QuotaRecord {
            let mut record =
                existing.unwrap_or_else(|| QuotaRecord::new(scope, &key, limit, now));
            // The caller's plan is authoritative for the limit
            record.limit = limit;
            if now >= record.resets_on {
                debug!("[QuotaLedger] Period rolled over for {}", key);
                record.used = 0;
                record.resets_on = super::next_reset(now);
            }
            if let Some(mutate) = mutator {
                mutate(&mut record);
            }
            if let Some(limit) = record.limit {
                record.used = record.used.min(limit);
            }
            record.updated_at = now;
            record
        };

        if let Some(shared) = &self.shared {
            match shared.transact(&key, &apply).await {
                Ok(record) => return QuotaSnapshot::from_record(&record),
                Err(e) => {
                    warn!(
                        "[QuotaLedger] Shared store unreachable, falling back to local: {}",
                        e
                    );
                }
            }
        }

        match self.local.transact(&key, &apply).await {
            Ok(record) => QuotaSnapshot::from_record(&record),
            Err(e) => {
                error!("[QuotaLedger] Local store failed, using in-flight record: {}", e);
                QuotaSnapshot::from_record(&apply(None))
            }
        }
    }

    /// Increment `used` by `amount` through the atomic mutator
    pub async fn record_usage(
        &self,
        scope: &QuotaScope,
        amount: u32,
        limit: Option<u32>,
    ) -> QuotaSnapshot {
        let mutate = move |record: &mut QuotaRecord| {
            record.used = record.used.saturating_add(amount);
        };
        self.ensure_snapshot(scope, limit, Some(&mutate)).await
    }

    /// Read-only access; still applies reset-if-expired and persists it
    pub async fn snapshot(&self, scope: &QuotaScope, limit: Option<u32>) -> QuotaSnapshot {
        self.ensure_snapshot(scope, limit, None).await
    }
}
