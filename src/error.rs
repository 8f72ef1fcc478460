//! Error types for jobflow-core.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias using jobflow-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during automation flows.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A referenced file does not exist
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    /// A file exceeds the allowed upload size
    #[error("file too large: {path} is {size} bytes (max {max})")]
    FileTooLarge { path: PathBuf, size: u64, max: u64 },

    /// A file exists but could not be read
    #[error("unreadable file {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    /// A file extension outside the accepted set
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat { extension: String },

    /// Timeout during an operation
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Page navigation failed
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// A selector matched nothing within its wait budget
    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    /// An element exists but cannot be interacted with
    #[error("element not interactable: {selector}")]
    NotInteractable { selector: String },

    /// The platform session is no longer authenticated
    #[error("user is logged out, re-login required")]
    LoggedOut,

    /// A CAPTCHA challenge blocks the flow
    #[error("captcha encountered, manual solve needed")]
    CaptchaRequired,

    /// Work was cancelled at a cooperative point
    #[error("operation cancelled")]
    Cancelled,

    /// LLM provider error
    #[error("LLM provider error: {0}")]
    Llm(String),

    /// Captcha solver service error
    #[error("captcha solver error: {0}")]
    Solver(String),

    /// Storage (CSV/JSON file) error
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a not-found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an unreadable-file error.
    pub fn unreadable(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Unreadable {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported-format error.
    pub fn unsupported_format(extension: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            extension: extension.into(),
        }
    }

    /// Create a timeout error from a duration.
    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout {
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Create a navigation error.
    pub fn navigation(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an element-not-found error.
    pub fn element_not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound {
            selector: selector.into(),
        }
    }

    /// Wrap an I/O error for a given path, mapping the not-found kind.
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(path),
            _ => Self::unreadable(path, err.to_string()),
        }
    }

    /// Whether a retry with backoff is worthwhile.
    ///
    /// Network and navigation failures are transient; everything else is
    /// either fatal, a validation failure, or handled by a more specific
    /// policy (reload-and-skip for DOM misses).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Navigation { .. })
    }

    /// Whether the error must abort the current flow without further retries.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::LoggedOut | Self::CaptchaRequired | Self::Cancelled
        )
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::timeout(std::time::Duration::from_secs(1)).is_retryable());
        assert!(Error::navigation("https://example.com", "net down").is_retryable());
        assert!(!Error::LoggedOut.is_retryable());
        assert!(!Error::element_not_found("#missing").is_retryable());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Config("missing data_dir".into()).is_fatal());
        assert!(Error::LoggedOut.is_fatal());
        assert!(Error::CaptchaRequired.is_fatal());
        assert!(!Error::timeout(std::time::Duration::from_secs(1)).is_fatal());
    }

    #[test]
    fn test_io_mapping() {
        let path = Path::new("/nope/cv.pdf");
        let err = Error::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, Error::NotFound { .. }));

        let err = Error::io(
            path,
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, Error::Unreadable { .. }));
    }
}
