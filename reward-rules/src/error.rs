//! Error types for reward rules

use thiserror::Error;

/// Rule configuration error
#[derive(Debug, Error)]
pub enum Error {
    /// Rule set could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Rule failed validation
    #[error("Invalid rule {rule}: {reason}")]
    InvalidRule {
        /// Rule name
        rule: String,
        /// What is wrong with it
        reason: String,
    },

    /// Two rules share a name
    #[error("Duplicate rule name: {0}")]
    DuplicateName(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid(rule: &str, reason: impl Into<String>) -> Self {
        Error::InvalidRule {
            rule: rule.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
