//! Common error types for Prefsync.

use thiserror::Error;

/// Top-level error type for Prefsync operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote API returned a non-success status.
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// Transport-level failure before a status was received.
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication or token handling failed.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Local token storage failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for 401/403 responses, which invalidate the current token.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::Http { status: 401 | 403, .. })
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = Error::Http {
            status: 404,
            message: "File not found".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 404: File not found");
    }

    #[test]
    fn test_is_auth_failure() {
        let unauthorized = Error::Http {
            status: 401,
            message: String::new(),
        };
        let forbidden = Error::Http {
            status: 403,
            message: String::new(),
        };
        let not_found = Error::Http {
            status: 404,
            message: String::new(),
        };

        assert!(unauthorized.is_auth_failure());
        assert!(forbidden.is_auth_failure());
        assert!(!not_found.is_auth_failure());
        assert!(!Error::Network("down".to_string()).is_auth_failure());
    }
}
