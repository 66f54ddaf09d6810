//! Analyzer and remote-provider configuration
//!
//! The remote provider is configuration-resolved, never hardcoded: base URL,
//! model and API key all come from the environment (a `.env` file is honored
//! when present).

use std::time::Duration;

/// Default cache TTL in days
pub const DEFAULT_CACHE_TTL_DAYS: i64 = 30;

/// Default audit ring-buffer capacity
pub const DEFAULT_AUDIT_CAPACITY: usize = 200;

/// Tunables for [`DocumentAnalyzer`](crate::DocumentAnalyzer)
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Result-cache TTL; records older than this are pruned at read time
    pub cache_ttl_days: i64,
    /// Audit log capacity; oldest entries are dropped past this
    pub audit_capacity: usize,
    /// Monthly remote-call limit per quota scope; `None` means unlimited
    pub monthly_limit: Option<u32>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            cache_ttl_days: DEFAULT_CACHE_TTL_DAYS,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            monthly_limit: None,
        }
    }
}

/// Configuration for the HTTP remote provider
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the chat-completions-compatible endpoint
    pub base_url: String,
    pub api_key: String,
    /// Model selector forwarded to the provider
    pub model: String,
    pub max_retries: u32,
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Resolve provider configuration from the environment
    ///
    /// Returns `None` when no API key is present, which the orchestrator
    /// reports as [`RemoteAvailability::NotConfigured`](crate::quota::RemoteAvailability).
    ///
    /// Environment variables:
    /// - `REMITOSCAN_API_KEY` (or `OPENAI_API_KEY` as fallback)
    /// - `REMITOSCAN_API_URL` (default `https://api.openai.com/v1`)
    /// - `REMITOSCAN_MODEL` (default `gpt-4o-mini`)
    pub fn from_env() -> Option<Self> {
        // Load .env once; missing file is fine
        let _ = dotenvy::dotenv();

        let api_key = std::env::var("REMITOSCAN_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok()?;

        let base_url = std::env::var("REMITOSCAN_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model =
            std::env::var("REMITOSCAN_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        Some(Self {
            base_url,
            api_key,
            model,
            max_retries: 3,
            timeout: Duration::from_secs(90),
        })
    }

    /// Build a config directly, for tests and embedded setups
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_retries: 3,
            timeout: Duration::from_secs(90),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.cache_ttl_days, 30);
        assert_eq!(config.audit_capacity, 200);
        assert!(config.monthly_limit.is_none());
    }

    #[test]
    fn test_remote_config_builder() {
        let config = RemoteConfig::new("https://api.example.com/v1", "sk-test", "test-model");
        assert_eq!(config.model, "test-model");
        assert_eq!(config.max_retries, 3);
    }
}
