//! SHA-256 content fingerprinting
//!
//! The fingerprint is the cache/dedup key: identical bytes always produce the
//! same digest, independent of where the hash runs.

use crate::error::HashingUnavailable;
use sha2::{Digest, Sha256};

/// Deterministic content hash of an uploaded document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the content fingerprint for a byte buffer
///
/// The sha2 backend is pure Rust and always present, so this implementation
/// never fails; the `Result` is part of the contract for environments where
/// a hash primitive may be missing. On `Err` the pipeline must continue
/// uncached, never abort.
pub fn fingerprint(bytes: &[u8]) -> Result<Fingerprint, HashingUnavailable> {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Ok(Fingerprint(hex::encode(hasher.finalize())))
}
