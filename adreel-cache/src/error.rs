//! Error types for media cache operations
//!
//! Every failure a fetch can settle with is represented here. Errors are
//! `Clone` because a single settled fetch is handed to every caller that
//! joined it while it was in flight.

use thiserror::Error;

/// Main error type for media cache operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    /// Resource unreachable or malformed
    #[error("Failed to load {key}: {reason}")]
    Load { key: String, reason: String },

    /// Loading was cancelled by the environment
    #[error("Loading of {key} was aborted")]
    Aborted { key: String },

    /// Readiness not reached within the load ceiling
    #[error("Loading of {key} timed out after {timeout_ms}ms")]
    Timeout { key: String, timeout_ms: u64 },

    /// Admission refused in strict eviction mode
    #[error("Resource of {required_bytes} bytes does not fit a budget of {max_bytes} bytes")]
    Capacity { required_bytes: u64, max_bytes: u64 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Coarse classification of [`MediaError`], handy for matching without fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaErrorKind {
    Load,
    Aborted,
    Timeout,
    Capacity,
    Config,
    Other,
}

impl MediaError {
    pub fn load(key: impl Into<String>, reason: impl Into<String>) -> Self {
        MediaError::Load {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn aborted(key: impl Into<String>) -> Self {
        MediaError::Aborted { key: key.into() }
    }

    pub fn kind(&self) -> MediaErrorKind {
        match self {
            MediaError::Load { .. } => MediaErrorKind::Load,
            MediaError::Aborted { .. } => MediaErrorKind::Aborted,
            MediaError::Timeout { .. } => MediaErrorKind::Timeout,
            MediaError::Capacity { .. } => MediaErrorKind::Capacity,
            MediaError::Config(_) => MediaErrorKind::Config,
            MediaError::Other(_) => MediaErrorKind::Other,
        }
    }

    /// The resource key this error belongs to, if it is a per-key failure
    pub fn key(&self) -> Option<&str> {
        match self {
            MediaError::Load { key, .. }
            | MediaError::Aborted { key }
            | MediaError::Timeout { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// Result type alias for media cache operations
pub type Result<T> = std::result::Result<T, MediaError>;

impl From<String> for MediaError {
    fn from(s: String) -> Self {
        MediaError::Other(s)
    }
}

impl From<&str> for MediaError {
    fn from(s: &str) -> Self {
        MediaError::Other(s.to_string())
    }
}
