//! External client contracts
//!
//! The capture client (login, scanning, OCR, duplicate/fraud detection) and
//! the ledger client (consent licenses, payables, receipt storage) are
//! external collaborators. The service only talks to them through these
//! traits.

pub mod memory;

use crate::account::{Account, Provider, RawAccount, Secret};
use crate::types::{Receipt, ScanMode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

pub use memory::{MemoryCaptureClient, MemoryLedgerClient};

/// Client error
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Request refused (bad credentials, missing consent on the client side)
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Client not reachable or not initialized
    #[error("client unavailable: {0}")]
    Unavailable(String),

    /// Requested item does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Anything else reported by the client
    #[error("{0}")]
    Other(String),
}

/// Result type for client calls
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Consent license registered with the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    /// License id
    pub id: String,

    /// Human readable name
    pub name: String,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Title held by the user for a license
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Title {
    /// License the title belongs to
    pub license_id: String,

    /// Issue time
    pub issued_at: DateTime<Utc>,

    /// Expiry, if any
    pub expires_at: Option<DateTime<Utc>>,
}

impl Title {
    /// Not expired at `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires| expires > now)
    }
}

/// Payable creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayableRequest {
    /// Amount owed to the user
    pub amount: Decimal,

    /// Description (the triggering event name)
    pub description: String,

    /// External id of the rewarded receipt
    pub external_receipt_id: Option<String>,
}

/// Payable recorded by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payable {
    /// Ledger id
    pub id: Uuid,

    /// Amount owed
    pub amount: Decimal,

    /// Currency
    pub currency: String,

    /// Description
    pub description: String,

    /// External receipt id
    pub external_receipt_id: Option<String>,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Receipt capture client
#[async_trait]
pub trait CaptureClient: Send + Sync {
    /// Verify credentials and link the account
    async fn login(
        &self,
        username: &str,
        password: Option<&Secret>,
        provider: Provider,
    ) -> ClientResult<()>;

    /// Log out one account, or every account when `None`
    async fn logout(&self, account: Option<&Account>) -> ClientResult<()>;

    /// Accounts persisted by the client
    async fn accounts(&self) -> ClientResult<Vec<RawAccount>>;

    /// Scan a receipt (camera for `Physical`, the account's inbox/orders for `Online`)
    async fn scan(&self, mode: ScanMode, account: Option<&Account>) -> ClientResult<Receipt>;

    /// Start background polling; receipts arrive on the returned channel
    async fn scrape(&self, account: &Account) -> ClientResult<mpsc::Receiver<Receipt>>;
}

/// Licensing and rewards ledger client
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// License by id
    async fn license(&self, id: &str) -> ClientResult<Option<License>>;

    /// Title held for a license
    async fn title(&self, license_id: &str) -> ClientResult<Option<Title>>;

    /// All licenses
    async fn licenses(&self) -> ClientResult<Vec<License>>;

    /// Record an amount owed to the user
    async fn create_payable(&self, request: PayableRequest) -> ClientResult<Payable>;

    /// All payables
    async fn payables(&self) -> ClientResult<Vec<Payable>>;

    /// Receipts stored on the ledger
    async fn receipts(&self) -> ClientResult<Vec<Receipt>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_title_activity() {
        let now = Utc::now();
        let open = Title {
            license_id: "l1".to_string(),
            issued_at: now,
            expires_at: None,
        };
        let expired = Title {
            expires_at: Some(now - Duration::days(1)),
            ..open.clone()
        };

        assert!(open.is_active(now));
        assert!(!expired.is_active(now));
    }
}
