//! # Error Handling
//!
//! Error types for the secretspin daemon, defined with `thiserror`.
//! Steady-state failures (Control API calls, unreadable files, rejected
//! service updates) are logged by their call sites and never terminate the
//! process; only configuration and watch-setup errors are fatal at startup.

/// Custom result type for secretspin operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the secretspin daemon
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cluster Control API call failed (transient, retried on a later cycle
    /// only if the underlying file still differs)
    #[error("Control API error: {0}")]
    ControlApi(String),

    /// Optimistic-concurrency service update rejected by the cluster
    #[error("Version conflict: {0}")]
    Conflict(String),

    /// Filesystem watch setup failed (fatal at startup)
    #[error("Watch error: {0}")]
    Watch(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new Control API error
    pub fn control_api<S: Into<String>>(message: S) -> Self {
        Self::ControlApi(message.into())
    }

    /// Create a new version-conflict error
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a new watch error
    pub fn watch<S: Into<String>>(message: S) -> Self {
        Self::Watch(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error is an optimistic-concurrency rejection
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("missing namespaces");
        assert_eq!(err.to_string(), "Configuration error: missing namespaces");

        let err = Error::control_api("secret create failed");
        assert_eq!(err.to_string(), "Control API error: secret create failed");
    }

    #[test]
    fn test_conflict_classifier() {
        assert!(Error::conflict("update out of sequence").is_conflict());
        assert!(!Error::control_api("boom").is_conflict());
        assert!(!Error::internal("boom").is_conflict());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
