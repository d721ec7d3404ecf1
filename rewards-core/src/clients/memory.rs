//! In-process capture and ledger clients
//!
//! Stand-ins for the native plugins: behaviour is scripted up front
//! (queued receipts, persisted accounts, consent grants, failures) and
//! every call is recorded so callers can inspect what the service did.

use super::{
    CaptureClient, ClientError, ClientResult, LedgerClient, License, Payable, PayableRequest,
    Title,
};
use crate::account::{Account, Provider, RawAccount, Secret};
use crate::types::{Receipt, ScanMode};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Calls received by [`MemoryCaptureClient`]
#[derive(Debug, Clone, Default)]
pub struct CaptureCalls {
    /// Usernames passed to `login`
    pub logins: Vec<String>,

    /// Usernames passed to `logout` (`None` for a full logout)
    pub logouts: Vec<Option<String>>,

    /// Number of `accounts` calls
    pub account_listings: usize,

    /// Scan mode and username of each `scan`
    pub scans: Vec<(ScanMode, Option<String>)>,

    /// Usernames passed to `scrape`
    pub scrapes: Vec<String>,
}

impl CaptureCalls {
    /// Number of scans in a mode
    pub fn scans_in(&self, mode: ScanMode) -> usize {
        self.scans.iter().filter(|(m, _)| *m == mode).count()
    }
}

#[derive(Debug, Default)]
struct CaptureState {
    persisted: Vec<RawAccount>,
    rejected_usernames: HashSet<String>,
    physical: VecDeque<Receipt>,
    online: VecDeque<Receipt>,
    scraped: Vec<Receipt>,
    accounts_failure: Option<String>,
    calls: CaptureCalls,
}

/// Scripted capture client
#[derive(Debug, Default)]
pub struct MemoryCaptureClient {
    state: Mutex<CaptureState>,
}

impl MemoryCaptureClient {
    /// Client with no accounts and no queued receipts
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account to the client's persisted store
    pub fn persist_account(&self, account: RawAccount) {
        self.state.lock().persisted.push(account);
    }

    /// Make `login` fail for a username
    pub fn reject_credentials(&self, username: impl Into<String>) {
        self.state.lock().rejected_usernames.insert(username.into());
    }

    /// Receipt returned by the next physical scan
    pub fn queue_physical(&self, receipt: Receipt) {
        self.state.lock().physical.push_back(receipt);
    }

    /// Receipt returned by the next online scan
    pub fn queue_online(&self, receipt: Receipt) {
        self.state.lock().online.push_back(receipt);
    }

    /// Receipt delivered by the next scrape
    pub fn queue_scraped(&self, receipt: Receipt) {
        self.state.lock().scraped.push(receipt);
    }

    /// Make `accounts` fail
    pub fn fail_accounts(&self, message: impl Into<String>) {
        self.state.lock().accounts_failure = Some(message.into());
    }

    /// Calls received so far
    pub fn calls(&self) -> CaptureCalls {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl CaptureClient for MemoryCaptureClient {
    async fn login(
        &self,
        username: &str,
        password: Option<&Secret>,
        provider: Provider,
    ) -> ClientResult<()> {
        let mut state = self.state.lock();
        state.calls.logins.push(username.to_string());

        if state.rejected_usernames.contains(username) {
            return Err(ClientError::Rejected(format!(
                "invalid credentials for {} ({})",
                username, provider
            )));
        }

        let known = state
            .persisted
            .iter()
            .any(|raw| raw.username == username && raw.provider_key == provider.key());
        if !known {
            state.persisted.push(RawAccount {
                username: username.to_string(),
                password: password.cloned(),
                provider_key: provider.key().to_string(),
                verified: true,
            });
        }

        debug!(username, %provider, "memory capture: login");
        Ok(())
    }

    async fn logout(&self, account: Option<&Account>) -> ClientResult<()> {
        let mut state = self.state.lock();
        state
            .calls
            .logouts
            .push(account.map(|a| a.username.clone()));

        match account {
            Some(account) => state.persisted.retain(|raw| {
                !(raw.username == account.username && raw.provider_key == account.provider.key())
            }),
            None => state.persisted.clear(),
        }

        Ok(())
    }

    async fn accounts(&self) -> ClientResult<Vec<RawAccount>> {
        let mut state = self.state.lock();
        state.calls.account_listings += 1;

        if let Some(message) = &state.accounts_failure {
            return Err(ClientError::Unavailable(message.clone()));
        }

        Ok(state.persisted.clone())
    }

    async fn scan(&self, mode: ScanMode, account: Option<&Account>) -> ClientResult<Receipt> {
        let mut state = self.state.lock();
        state
            .calls
            .scans
            .push((mode, account.map(|a| a.username.clone())));

        match mode {
            ScanMode::Physical => state
                .physical
                .pop_front()
                .ok_or_else(|| ClientError::NotFound("no receipt in camera frame".to_string())),
            ScanMode::Online => {
                let account = account.ok_or_else(|| {
                    ClientError::Rejected("online scan requires an account".to_string())
                })?;
                let mut receipt = state.online.pop_front().ok_or_else(|| {
                    ClientError::NotFound(format!("no new receipts for {}", account))
                })?;
                if receipt.account.is_none() {
                    receipt.account = Some(account.clone());
                }
                Ok(receipt)
            }
        }
    }

    async fn scrape(&self, account: &Account) -> ClientResult<mpsc::Receiver<Receipt>> {
        let mut state = self.state.lock();
        state.calls.scrapes.push(account.username.clone());

        let receipts: Vec<Receipt> = state.scraped.drain(..).collect();
        let (tx, rx) = mpsc::channel(receipts.len().max(1));
        for mut receipt in receipts {
            if receipt.account.is_none() {
                receipt.account = Some(account.clone());
            }
            tx.try_send(receipt)
                .map_err(|e| ClientError::Other(format!("scrape channel: {}", e)))?;
        }

        Ok(rx)
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    licenses: Vec<License>,
    titles: HashMap<String, Title>,
    payables: Vec<Payable>,
    receipts: Vec<Receipt>,
    payable_failure: Option<String>,
}

/// Scripted ledger client
#[derive(Debug)]
pub struct MemoryLedgerClient {
    currency: String,
    state: Mutex<LedgerState>,
}

impl MemoryLedgerClient {
    /// Empty ledger issuing payables in `currency`
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Register a license and give the user a non-expiring title for it
    pub fn grant_consent(&self, license_id: impl Into<String>) {
        let license_id = license_id.into();
        let now = Utc::now();
        let mut state = self.state.lock();

        if !state.licenses.iter().any(|l| l.id == license_id) {
            state.licenses.push(License {
                id: license_id.clone(),
                name: format!("{} consent", license_id),
                created_at: now,
            });
        }
        state.titles.insert(
            license_id.clone(),
            Title {
                license_id,
                issued_at: now,
                expires_at: None,
            },
        );
    }

    /// Expire the title for a license, keeping the license itself
    pub fn expire_title(&self, license_id: &str) {
        if let Some(title) = self.state.lock().titles.get_mut(license_id) {
            title.expires_at = Some(Utc::now() - Duration::seconds(1));
        }
    }

    /// Remove the user's title for a license
    pub fn revoke_title(&self, license_id: &str) {
        self.state.lock().titles.remove(license_id);
    }

    /// Store a receipt on the ledger
    pub fn store_receipt(&self, receipt: Receipt) {
        self.state.lock().receipts.push(receipt);
    }

    /// Make `create_payable` fail
    pub fn fail_payables(&self, message: impl Into<String>) {
        self.state.lock().payable_failure = Some(message.into());
    }

    /// Payables recorded so far
    pub fn recorded_payables(&self) -> Vec<Payable> {
        self.state.lock().payables.clone()
    }
}

impl Default for MemoryLedgerClient {
    fn default() -> Self {
        Self::new("USD")
    }
}

#[async_trait]
impl LedgerClient for MemoryLedgerClient {
    async fn license(&self, id: &str) -> ClientResult<Option<License>> {
        Ok(self
            .state
            .lock()
            .licenses
            .iter()
            .find(|license| license.id == id)
            .cloned())
    }

    async fn title(&self, license_id: &str) -> ClientResult<Option<Title>> {
        Ok(self.state.lock().titles.get(license_id).cloned())
    }

    async fn licenses(&self) -> ClientResult<Vec<License>> {
        Ok(self.state.lock().licenses.clone())
    }

    async fn create_payable(&self, request: PayableRequest) -> ClientResult<Payable> {
        let mut state = self.state.lock();

        if let Some(message) = &state.payable_failure {
            return Err(ClientError::Unavailable(message.clone()));
        }

        if request.amount <= Decimal::ZERO {
            return Err(ClientError::Rejected(format!(
                "payable amount must be positive, got {}",
                request.amount
            )));
        }

        let payable = Payable {
            id: Uuid::now_v7(),
            amount: request.amount,
            currency: self.currency.clone(),
            description: request.description,
            external_receipt_id: request.external_receipt_id,
            created_at: Utc::now(),
        };
        state.payables.push(payable.clone());

        debug!(
            payable_id = %payable.id,
            amount = %payable.amount,
            "memory ledger: payable created"
        );
        Ok(payable)
    }

    async fn payables(&self) -> ClientResult<Vec<Payable>> {
        Ok(self.state.lock().payables.clone())
    }

    async fn receipts(&self) -> ClientResult<Vec<Receipt>> {
        Ok(self.state.lock().receipts.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(username: &str, provider_key: &str) -> RawAccount {
        RawAccount {
            username: username.to_string(),
            password: None,
            provider_key: provider_key.to_string(),
            verified: true,
        }
    }

    #[tokio::test]
    async fn test_login_persists_account() {
        let client = MemoryCaptureClient::new();
        client
            .login("a@gmail.com", None, Provider::Gmail)
            .await
            .unwrap();

        let accounts = client.accounts().await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].provider_key, "gmail");
    }

    #[tokio::test]
    async fn test_rejected_login() {
        let client = MemoryCaptureClient::new();
        client.reject_credentials("bad@gmail.com");

        let result = client.login("bad@gmail.com", None, Provider::Gmail).await;
        assert!(matches!(result, Err(ClientError::Rejected(_))));
        assert!(client.accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_logout_one_account() {
        let client = MemoryCaptureClient::new();
        client.persist_account(raw("a@gmail.com", "gmail"));
        client.persist_account(raw("b@yahoo.com", "yahoo"));

        let account = Account::new("a@gmail.com", Provider::Gmail);
        client.logout(Some(&account)).await.unwrap();

        let remaining = client.accounts().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].username, "b@yahoo.com");
    }

    #[tokio::test]
    async fn test_online_scan_attaches_account() {
        let client = MemoryCaptureClient::new();
        client.queue_online(Receipt::new("r1"));

        let account = Account::new("a@gmail.com", Provider::Gmail);
        let receipt = client
            .scan(ScanMode::Online, Some(&account))
            .await
            .unwrap();

        assert_eq!(receipt.provider(), Some(Provider::Gmail));
        assert_eq!(client.calls().scans_in(ScanMode::Online), 1);
    }

    #[tokio::test]
    async fn test_empty_physical_queue() {
        let client = MemoryCaptureClient::new();
        let result = client.scan(ScanMode::Physical, None).await;
        assert!(matches!(result, Err(ClientError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_scrape_delivers_queued_receipts() {
        let client = MemoryCaptureClient::new();
        client.queue_scraped(Receipt::new("r1"));
        client.queue_scraped(Receipt::new("r2"));

        let account = Account::new("a@outlook.com", Provider::Outlook);
        let mut rx = client.scrape(&account).await.unwrap();

        let mut ids = Vec::new();
        while let Some(receipt) = rx.recv().await {
            ids.push(receipt.id);
        }
        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[tokio::test]
    async fn test_consent_grant_and_expiry() {
        let ledger = MemoryLedgerClient::default();
        assert!(ledger.license("consent").await.unwrap().is_none());

        ledger.grant_consent("consent");
        let title = ledger.title("consent").await.unwrap().unwrap();
        assert!(title.is_active(Utc::now()));

        ledger.expire_title("consent");
        let title = ledger.title("consent").await.unwrap().unwrap();
        assert!(!title.is_active(Utc::now()));
    }

    #[tokio::test]
    async fn test_create_payable() {
        let ledger = MemoryLedgerClient::new("EUR");
        let payable = ledger
            .create_payable(PayableRequest {
                amount: Decimal::new(500, 2),
                description: "SCAN".to_string(),
                external_receipt_id: Some("r1".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(payable.currency, "EUR");
        assert_eq!(ledger.payables().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_payable_rejects_zero() {
        let ledger = MemoryLedgerClient::default();
        let result = ledger
            .create_payable(PayableRequest {
                amount: Decimal::ZERO,
                description: "LINK".to_string(),
                external_receipt_id: None,
            })
            .await;
        assert!(result.is_err());
    }
}
