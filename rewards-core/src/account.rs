//! Linked account model
//!
//! Accounts are email or retailer credentials linked through the capture
//! client. Raw records coming back from the capture client carry a free-form
//! provider key and are normalized before they enter the account cache.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Email inbox scraped for e-receipts
    Email,
    /// Retailer account with order history
    Retailer,
}

/// Account provider understood by the capture client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Provider {
    /// Gmail
    Gmail,
    /// Outlook / Hotmail
    Outlook,
    /// Yahoo Mail
    Yahoo,
    /// AOL Mail
    Aol,
    /// iCloud Mail
    Icloud,
    /// Amazon
    Amazon,
    /// Walmart
    Walmart,
    /// Target
    Target,
    /// Kroger
    Kroger,
    /// Instacart
    Instacart,
}

impl Provider {
    /// All known providers
    pub const ALL: [Provider; 10] = [
        Provider::Gmail,
        Provider::Outlook,
        Provider::Yahoo,
        Provider::Aol,
        Provider::Icloud,
        Provider::Amazon,
        Provider::Walmart,
        Provider::Target,
        Provider::Kroger,
        Provider::Instacart,
    ];

    /// Key passed to the capture client
    pub fn key(&self) -> &'static str {
        match self {
            Provider::Gmail => "gmail",
            Provider::Outlook => "outlook",
            Provider::Yahoo => "yahoo",
            Provider::Aol => "aol",
            Provider::Icloud => "icloud",
            Provider::Amazon => "amazon",
            Provider::Walmart => "walmart",
            Provider::Target => "target",
            Provider::Kroger => "kroger",
            Provider::Instacart => "instacart",
        }
    }

    /// Parse a capture client key (case-insensitive)
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL
            .into_iter()
            .find(|provider| provider.key().eq_ignore_ascii_case(key))
    }

    /// Email or retailer
    pub fn kind(&self) -> AccountKind {
        match self {
            Provider::Gmail
            | Provider::Outlook
            | Provider::Yahoo
            | Provider::Aol
            | Provider::Icloud => AccountKind::Email,
            Provider::Amazon
            | Provider::Walmart
            | Provider::Target
            | Provider::Kroger
            | Provider::Instacart => AccountKind::Retailer,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Credential that never shows up in logs
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value (only for handing to the capture client)
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

/// Account record as persisted by the capture client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAccount {
    /// Username or email address, as typed by the user
    pub username: String,

    /// Stored password, when the client keeps one
    #[serde(default)]
    pub password: Option<Secret>,

    /// Provider key (e.g. "gmail", "Amazon")
    pub provider_key: String,

    /// Whether the client has verified the credentials
    #[serde(default)]
    pub verified: bool,
}

/// Linked account
///
/// Identity is the `(username, provider)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Normalized username
    pub username: String,

    /// Password used for login
    #[serde(default, skip_serializing)]
    pub password: Option<Secret>,

    /// Provider
    pub provider: Provider,

    /// Credentials verified by the capture client
    #[serde(default)]
    pub verified: bool,
}

impl Account {
    /// Create an unverified account without a password
    pub fn new(username: impl Into<String>, provider: Provider) -> Self {
        Self {
            username: normalize_username(&username.into(), provider),
            password: None,
            provider,
            verified: false,
        }
    }

    /// Attach a password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Secret::new(password));
        self
    }

    /// Email or retailer
    pub fn kind(&self) -> AccountKind {
        self.provider.kind()
    }

    /// Same `(username, provider)` identity
    pub fn same_identity(&self, other: &Account) -> bool {
        self.username == other.username && self.provider == other.provider
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.provider)
    }
}

impl TryFrom<RawAccount> for Account {
    type Error = Error;

    fn try_from(raw: RawAccount) -> Result<Self> {
        let provider = Provider::from_key(&raw.provider_key).ok_or_else(|| {
            Error::InvalidAccount(format!("unknown provider key '{}'", raw.provider_key))
        })?;

        let username = normalize_username(&raw.username, provider);
        if username.is_empty() {
            return Err(Error::InvalidAccount(format!(
                "empty username for provider {}",
                provider
            )));
        }

        Ok(Self {
            username,
            password: raw.password,
            provider,
            verified: raw.verified,
        })
    }
}

/// Email addresses compare case-insensitively; retailer logins are kept as typed
fn normalize_username(username: &str, provider: Provider) -> String {
    let trimmed = username.trim();
    match provider.kind() {
        AccountKind::Email => trimmed.to_lowercase(),
        AccountKind::Retailer => trimmed.to_string(),
    }
}
