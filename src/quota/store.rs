//! Quota record stores
//!
//! A store executes the whole read-modify-write as one atomic step so
//! concurrent callers (multiple tabs/devices of one tenant) cannot lose
//! updates. The shared transactional store is the authoritative copy; the
//! SQLite store doubles as the single-device fallback. The fallback has no
//! cross-device protection, an accepted consistency trade-off.

use super::QuotaRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Mutex;

/// Atomic read-modify-write over one scope key
///
/// `apply` receives the current record (or `None` on first access) and
/// returns the record to persist.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn transact(
        &self,
        scope_key: &str,
        apply: &(dyn Fn(Option<QuotaRecord>) -> QuotaRecord + Sync),
    ) -> Result<QuotaRecord, String>;
}

/// Volatile store; the DashMap entry lock makes each transact atomic
#[derive(Default)]
pub struct MemoryQuotaStore {
    records: DashMap<String, QuotaRecord>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn transact(
        &self,
        scope_key: &str,
        apply: &(dyn Fn(Option<QuotaRecord>) -> QuotaRecord + Sync),
    ) -> Result<QuotaRecord, String> {
        use dashmap::mapref::entry::Entry;

        match self.records.entry(scope_key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let next = apply(Some(occupied.get().clone()));
                occupied.insert(next.clone());
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                let next = apply(None);
                vacant.insert(next.clone());
                Ok(next)
            }
        }
    }
}

/// SQLite-backed store for local, single-device persistence
pub struct SqliteQuotaStore {
    conn: Mutex<Connection>,
}

impl SqliteQuotaStore {
    /// Create or open the quota database at `<config_dir>/remitoscan/quota.db`
    pub fn new() -> Result<Self, String> {
        let dir = dirs::config_dir()
            .ok_or_else(|| "Could not determine config directory".to_string())?;
        Self::with_path(dir.join("remitoscan").join("quota.db"))
    }

    pub fn with_path(path: PathBuf) -> Result<Self, String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }

        let conn = Connection::open(&path)
            .map_err(|e| format!("Failed to open quota database: {}", e))?;
        Self::init(conn)
    }

    /// In-memory database for tests
    pub fn in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory()
            .map_err(|e| format!("Failed to open in-memory database: {}", e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, String> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS quota_usage (
                scope_key TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                user_id TEXT,
                email TEXT,
                limit_count INTEGER,
                used INTEGER NOT NULL DEFAULT 0,
                resets_on TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#,
        )
        .map_err(|e| format!("Failed to create quota table: {}", e))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn parse_timestamp(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[async_trait]
impl QuotaStore for SqliteQuotaStore {
    async fn transact(
        &self,
        scope_key: &str,
        apply: &(dyn Fn(Option<QuotaRecord>) -> QuotaRecord + Sync),
    ) -> Result<QuotaRecord, String> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| format!("Failed to start transaction: {}", e))?;

        let existing = tx
            .query_row(
                "SELECT scope_key, organization_id, user_id, email, limit_count, used,
                        resets_on, updated_at
                 FROM quota_usage WHERE scope_key = ?1",
                params![scope_key],
                |row| {
                    Ok(QuotaRecord {
                        scope_key: row.get(0)?,
                        organization_id: row.get(1)?,
                        user_id: row.get(2)?,
                        email: row.get(3)?,
                        limit: row.get(4)?,
                        used: row.get(5)?,
                        resets_on: parse_timestamp(&row.get::<_, String>(6)?)?,
                        updated_at: parse_timestamp(&row.get::<_, String>(7)?)?,
                    })
                },
            )
            .optional()
            .map_err(|e| format!("Quota query failed: {}", e))?;

        let next = apply(existing);

        tx.execute(
            "INSERT OR REPLACE INTO quota_usage
                (scope_key, organization_id, user_id, email, limit_count, used,
                 resets_on, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                next.scope_key,
                next.organization_id,
                next.user_id,
                next.email,
                next.limit,
                next.used,
                next.resets_on.to_rfc3339(),
                next.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| format!("Failed to persist quota record: {}", e))?;

        tx.commit()
            .map_err(|e| format!("Failed to commit quota transaction: {}", e))?;

        Ok(next)
    }
}
