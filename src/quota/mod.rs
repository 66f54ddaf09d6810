//! Per-tenant usage quota for the remote AI tier
//!
//! Counters are scoped to `organizationId + userId (or email) + period`,
//! where the period is the current UTC month (`YYYYMM`). A record's
//! `resetsOn` is the first day of the next calendar month at local midnight;
//! it is computed when the record is created and recomputed only when an
//! access finds `now >= resetsOn`, never on every access.
//!
//! The ledger reports remaining budget; it does not block calls itself. The
//! orchestrator checks `remaining` before invoking the remote tier.

mod ledger;
mod store;

pub use ledger::{QuotaLedger, QuotaMutator};
pub use store::{MemoryQuotaStore, QuotaStore, SqliteQuotaStore};

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Identity of one quota scope (tenant member)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaScope {
    pub organization_id: String,
    pub user_id: Option<String>,
    /// Fallback principal when no user id exists
    pub email: Option<String>,
}

impl QuotaScope {
    pub fn new(organization_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            user_id: Some(user_id.into()),
            email: None,
        }
    }

    pub fn with_email(organization_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            user_id: None,
            email: Some(email.into()),
        }
    }

    fn principal(&self) -> &str {
        self.user_id
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("anonymous")
    }

    /// Document key: `{organizationId}__{userId}__{period}`
    pub fn key_for_period(&self, period: &str) -> String {
        format!("{}__{}__{}", self.organization_id, self.principal(), period)
    }
}

/// Current quota period, UTC-month granularity
pub fn current_period(now: DateTime<Utc>) -> String {
    now.format("%Y%m").to_string()
}

/// First day of the next calendar month at local midnight
///
/// Strictly greater than `now` for any input, so `resetsOn` always advances
/// across rollovers.
pub fn next_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let local = now.with_timezone(&Local);
    let (year, month) = if local.month() == 12 {
        (local.year() + 1, 1)
    } else {
        (local.year(), local.month() + 1)
    };

    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        // Valid year/month always maps to a date; keep a sane fallback anyway
        .unwrap_or_else(|| now + Duration::days(30))
}

/// Persisted usage record for one scope and period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaRecord {
    pub scope_key: String,
    pub organization_id: String,
    pub user_id: Option<String>,
    pub email: Option<String>,
    /// `None` means unlimited
    pub limit: Option<u32>,
    pub used: u32,
    pub resets_on: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuotaRecord {
    /// Lazily created on first access for a scope/period
    pub fn new(
        scope: &QuotaScope,
        scope_key: &str,
        limit: Option<u32>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            scope_key: scope_key.to_string(),
            organization_id: scope.organization_id.clone(),
            user_id: scope.user_id.clone(),
            email: scope.email.clone(),
            limit,
            used: 0,
            resets_on: next_reset(now),
            updated_at: now,
        }
    }
}

/// What a caller sees after an access: counters plus the reset date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSnapshot {
    pub used: u32,
    pub limit: Option<u32>,
    /// `None` means unlimited
    pub remaining: Option<u32>,
    pub resets_on: DateTime<Utc>,
}

impl QuotaSnapshot {
    pub fn from_record(record: &QuotaRecord) -> Self {
        Self {
            used: record.used,
            limit: record.limit,
            remaining: record.limit.map(|l| l.saturating_sub(record.used)),
            resets_on: record.resets_on,
        }
    }
}

/// Consolidated remote-tier gate
///
/// One value instead of independently-checked "provider configured" and
/// "quota available" booleans at every call site. Serializes onto analysis
/// outcomes so the UI can explain a skipped remote tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RemoteAvailability {
    NotConfigured,
    #[serde(rename_all = "camelCase")]
    QuotaExhausted {
        used: u32,
        limit: u32,
        resets_on: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Available {
        remaining: Option<u32>,
    },
}

impl RemoteAvailability {
    pub fn evaluate(provider_configured: bool, snapshot: &QuotaSnapshot) -> Self {
        if !provider_configured {
            return Self::NotConfigured;
        }
        match (snapshot.limit, snapshot.remaining) {
            (Some(limit), Some(0)) => Self::QuotaExhausted {
                used: snapshot.used,
                limit,
                resets_on: snapshot.resets_on,
            },
            (_, remaining) => Self::Available { remaining },
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

impl std::fmt::Display for RemoteAvailability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "AI analysis is not configured"),
            Self::QuotaExhausted {
                used,
                limit,
                resets_on,
            } => write!(
                f,
                "Monthly AI quota exhausted ({}/{}), resets on {}",
                used,
                limit,
                resets_on.format("%Y-%m-%d")
            ),
            Self::Available {
                remaining: Some(remaining),
            } => write!(f, "{} AI analyses remaining this month", remaining),
            Self::Available { remaining: None } => write!(f, "AI analysis available"),
        }
    }
}
