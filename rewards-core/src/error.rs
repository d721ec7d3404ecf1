//! Error types for the rewards service

use crate::clients::ClientError;
use thiserror::Error;

/// Result type for rewards operations
pub type Result<T> = std::result::Result<T, Error>;

/// Rewards service errors
#[derive(Error, Debug)]
pub enum Error {
    /// No active license or title for the rewards program
    #[error("Consent missing: no active license or title for {license_id}")]
    ConsentMissing {
        /// License identifier that was looked up
        license_id: String,
    },

    /// Capture or ledger client call failed
    #[error("Plugin call failed during {operation}: {source}")]
    Plugin {
        /// Client operation that failed
        operation: &'static str,
        /// Original client error
        #[source]
        source: ClientError,
    },

    /// Account data could not be normalized
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// Caller supplied an unusable request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Host listener returned an error
    #[error("Listener {id} failed: {source}")]
    Listener {
        /// Registration id of the listener
        id: String,
        /// Error returned by the listener
        #[source]
        source: anyhow::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a client error with the operation that produced it
    pub fn plugin(operation: &'static str) -> impl FnOnce(ClientError) -> Self {
        move |source| Error::Plugin { operation, source }
    }

    /// Whether the error is a missing-consent failure
    pub fn is_consent_missing(&self) -> bool {
        matches!(self, Error::ConsentMissing { .. })
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Metrics(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_plugin_error_keeps_source() {
        let err = Error::plugin("login")(ClientError::Rejected("bad password".to_string()));
        assert!(err.to_string().contains("login"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_consent_missing_names_license() {
        let err = Error::ConsentMissing {
            license_id: "rewards-consent".to_string(),
        };
        assert!(err.is_consent_missing());
        assert!(err.to_string().contains("rewards-consent"));
    }
}
