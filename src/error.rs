//! Error taxonomy for the analysis pipeline
//!
//! Only two kinds surface as hard errors to callers: input validation
//! (unsupported file type) and remote-tier failures. Everything else
//! degrades: quota exhaustion yields an empty result with the reason on
//! [`AnalysisOutcome`](crate::types::AnalysisOutcome), and storage or
//! hashing failures fall back to uncached operation with a warning.

use thiserror::Error;

/// Hard errors surfaced by [`DocumentAnalyzer::analyze`](crate::DocumentAnalyzer::analyze)
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("unsupported file type for analysis: {mime} ({file_name})")]
    UnsupportedFile { file_name: String, mime: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl AnalysisError {
    /// Whether retrying the same request right away can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UnsupportedFile { .. } => false,
            Self::Remote(e) => e.is_retryable(),
        }
    }
}

/// Failure of the remote AI tier
///
/// Never consumes quota; usage is only recorded after a successful response.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote provider not configured")]
    NotConfigured,

    #[error("remote request failed: {0}")]
    Network(String),

    #[error("remote API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("malformed remote response: {0}")]
    MalformedResponse(String),
}

impl RemoteError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotConfigured => false,
            Self::Network(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::MalformedResponse(_) => true,
        }
    }
}

/// Hash primitive unavailable in the current environment
///
/// Callers continue the pipeline uncached rather than abort.
#[derive(Debug, Error)]
#[error("no cryptographic hash primitive available: {0}")]
pub struct HashingUnavailable(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_file_not_retryable() {
        let err = AnalysisError::UnsupportedFile {
            file_name: "archive.zip".to_string(),
            mime: "application/zip".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("application/zip"));
    }

    #[test]
    fn test_remote_retryability() {
        assert!(RemoteError::Network("timeout".into()).is_retryable());
        assert!(RemoteError::Api { status: 429, body: String::new() }.is_retryable());
        assert!(RemoteError::Api { status: 503, body: String::new() }.is_retryable());
        assert!(!RemoteError::Api { status: 401, body: String::new() }.is_retryable());
        assert!(!RemoteError::NotConfigured.is_retryable());
    }

    #[test]
    fn test_remote_error_wraps_into_analysis_error() {
        let err: AnalysisError = RemoteError::Network("reset".into()).into();
        assert!(err.is_retryable());
    }
}
