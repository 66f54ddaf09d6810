//! Backing stores for the result cache
//!
//! The cache persists its whole record set under one key, so the store
//! surface is load/save/clear. In-memory for tests, a JSON file under the
//! user config dir in production.

use super::CacheRecord;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::RwLock;

/// Swappable backing store for [`ResultCache`](super::ResultCache)
pub trait CacheStore: Send + Sync {
    fn load(&self) -> Result<Vec<CacheRecord>, String>;
    fn save(&self, records: &[CacheRecord]) -> Result<(), String>;
    fn clear(&self) -> Result<(), String>;
}

/// Volatile store for tests and single-run sessions
#[derive(Default)]
pub struct MemoryCacheStore {
    records: RwLock<Vec<CacheRecord>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self) -> Result<Vec<CacheRecord>, String> {
        Ok(self.records.read().unwrap().clone())
    }

    fn save(&self, records: &[CacheRecord]) -> Result<(), String> {
        *self.records.write().unwrap() = records.to_vec();
        Ok(())
    }

    fn clear(&self) -> Result<(), String> {
        self.records.write().unwrap().clear();
        Ok(())
    }
}

/// JSON-file store under the platform config directory
pub struct JsonFileCacheStore {
    path: PathBuf,
}

impl JsonFileCacheStore {
    /// Store at `<config_dir>/remitoscan/analysis_cache.json`
    pub fn new() -> Result<Self, String> {
        let dir = dirs::config_dir().ok_or_else(|| "Could not determine config directory".to_string())?;
        Ok(Self {
            path: dir.join("remitoscan").join("analysis_cache.json"),
        })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CacheStore for JsonFileCacheStore {
    fn load(&self) -> Result<Vec<CacheRecord>, String> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .map_err(|e| format!("Failed to open cache file {}: {}", self.path.display(), e))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| format!("Failed to parse cache file: {}", e))
    }

    fn save(&self, records: &[CacheRecord]) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create cache directory: {}", e))?;
        }

        let file = File::create(&self.path)
            .map_err(|e| format!("Failed to create cache file {}: {}", self.path.display(), e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, records)
            .map_err(|e| format!("Failed to serialize cache: {}", e))?;
        writer
            .flush()
            .map_err(|e| format!("Failed to flush cache file: {}", e))
    }

    fn clear(&self) -> Result<(), String> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| format!("Failed to remove cache file: {}", e))?;
        }
        Ok(())
    }
}
