//! Reward orchestration service
//!
//! Bridges capture-client callbacks and the account/receipt lifecycle into
//! reward issuance. One service instance is created per session and passed
//! by reference to whoever needs it.
//!
//! # Decision loop
//!
//! ```text
//!   event + details
//!         │
//!         ▼
//!   for each rule that handles the event      (fan-out, no winner)
//!         │ amount?
//!         ▼
//!   HistoryEvent::new ──► LedgerClient::create_payable ──► HistoryLog::append
//! ```
//!
//! # Example
//!
//! ```no_run
//! use rewards_core::clients::{MemoryCaptureClient, MemoryLedgerClient};
//! use rewards_core::{Account, Config, DomainEvent, FnRule, Provider, RewardService};
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> rewards_core::Result<()> {
//!     let rules: Vec<Arc<dyn rewards_core::RewardRule>> = vec![Arc::new(FnRule::new(
//!         "link-bonus",
//!         [DomainEvent::Link],
//!         |_, _| Some(Decimal::ONE),
//!     ))];
//!
//!     let service = RewardService::new(
//!         Config::default(),
//!         Arc::new(MemoryCaptureClient::new()),
//!         Arc::new(MemoryLedgerClient::default()),
//!         rules,
//!     )?;
//!
//!     service
//!         .login(Account::new("me@gmail.com", Provider::Gmail).with_password("pw"))
//!         .await?;
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

use crate::{
    account::{Account, RawAccount},
    clients::{CaptureClient, LedgerClient, License, Payable, PayableRequest, Title},
    history::HistoryLog,
    listeners::ListenerRegistry,
    metrics::Metrics,
    rules::{EventDetails, RewardRule},
    types::{DomainEvent, HistoryEvent, Receipt, RejectionReason, ScanMode, ScanOutcome},
    Config, Error, Result,
};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// What happened to an account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountChange {
    /// Logged in through the service
    Linked,
    /// Loaded from the capture client's persisted store
    Restored,
    /// Logged out
    Unlinked,
}

/// Callback fired on account changes
pub type AccountListener = dyn Fn(&Account, AccountChange) -> anyhow::Result<()> + Send + Sync;

/// Callback fired for every admitted receipt
pub type ReceiptListener = dyn Fn(&Receipt) -> anyhow::Result<()> + Send + Sync;

/// State shared with background scan and scrape tasks
struct Inner {
    config: Config,
    capture: Arc<dyn CaptureClient>,
    ledger: Arc<dyn LedgerClient>,
    rules: Vec<Arc<dyn RewardRule>>,
    accounts: RwLock<Vec<Account>>,
    account_listeners: RwLock<ListenerRegistry<AccountListener>>,
    receipt_listeners: RwLock<ListenerRegistry<ReceiptListener>>,
    history: HistoryLog,
    metrics: Metrics,
}

/// Reward orchestration service
pub struct RewardService {
    inner: Arc<Inner>,
    background: Mutex<JoinSet<Result<()>>>,
}

impl RewardService {
    /// Create a service
    ///
    /// `rules` is evaluated in order on every event; every rule that returns
    /// an amount issues its own payable.
    pub fn new(
        config: Config,
        capture: Arc<dyn CaptureClient>,
        ledger: Arc<dyn LedgerClient>,
        rules: Vec<Arc<dyn RewardRule>>,
    ) -> Result<Self> {
        config.validate()?;
        let metrics = Metrics::new()?;

        info!(
            service = %config.service_name,
            rules = rules.len(),
            threshold = config.scan.ocr_confidence_threshold,
            "Reward service initialized"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                capture,
                ledger,
                rules,
                accounts: RwLock::new(Vec::new()),
                account_listeners: RwLock::new(ListenerRegistry::new()),
                receipt_listeners: RwLock::new(ListenerRegistry::new()),
                history: HistoryLog::new(),
                metrics,
            }),
            background: Mutex::new(JoinSet::new()),
        })
    }

    /// Log in through the capture client and link the account
    ///
    /// On success the account is marked verified, cached, announced to
    /// account listeners and run through the decision loop as LINK.
    pub async fn login(&self, mut account: Account) -> Result<Account> {
        self.inner
            .capture
            .login(&account.username, account.password.as_ref(), account.provider)
            .await
            .map_err(Error::plugin("login"))?;

        account.verified = true;
        self.inner.accounts.write().push(account.clone());
        info!(account = %account, "Account linked");

        self.inner.notify_account(&account, AccountChange::Linked)?;
        self.inner
            .process(DomainEvent::Link, EventDetails::for_account(&account))
            .await?;

        Ok(account)
    }

    /// Log out one account, or every account when `None`
    pub async fn logout(&self, account: Option<&Account>) -> Result<()> {
        let Some(account) = account else {
            let cleared = {
                let mut accounts = self.inner.accounts.write();
                let count = accounts.len();
                accounts.clear();
                count
            };
            self.inner
                .capture
                .logout(None)
                .await
                .map_err(Error::plugin("logout"))?;
            info!(cleared, "All accounts logged out");
            return Ok(());
        };

        self.inner
            .capture
            .logout(Some(account))
            .await
            .map_err(Error::plugin("logout"))?;

        // Keeps only entries that differ in both username and provider.
        self.inner.accounts.write().retain(|cached| {
            cached.username != account.username && cached.provider != account.provider
        });
        info!(account = %account, "Account unlinked");

        self.inner.notify_account(account, AccountChange::Unlinked)?;
        self.inner
            .process(DomainEvent::Unlink, EventDetails::for_account(account))
            .await?;

        Ok(())
    }

    /// Load persisted accounts and start a background online scan for each
    pub async fn accounts(&self) -> Result<Vec<Account>> {
        let raw_accounts = self
            .inner
            .capture
            .accounts()
            .await
            .map_err(Error::plugin("accounts"))?;

        let mut loaded = Vec::with_capacity(raw_accounts.len());
        for raw in raw_accounts {
            let account = match normalize(raw) {
                Some(account) => account,
                None => continue,
            };

            self.inner.accounts.write().push(account.clone());
            self.inner.notify_account(&account, AccountChange::Restored)?;
            self.spawn_online_scan(account.clone());
            loaded.push(account);
        }

        info!(count = loaded.len(), "Accounts restored");
        Ok(loaded)
    }

    /// Scan a receipt
    ///
    /// Physical scans need active consent and must clear the OCR confidence
    /// threshold. Online scans need an account and go straight to admission.
    pub async fn scan(&self, mode: ScanMode, account: Option<&Account>) -> Result<ScanOutcome> {
        match mode {
            ScanMode::Physical => self.inner.physical_scan().await,
            ScanMode::Online => {
                let account = account.ok_or_else(|| {
                    Error::InvalidRequest("online scan requires an account".to_string())
                })?;
                self.inner.online_scan(account.clone()).await
            }
        }
    }

    /// Start background scraping for an account
    ///
    /// Every scraped receipt goes through admission like an online scan.
    /// A failing receipt does not stop the scrape; the first failure is
    /// reported once the channel closes.
    pub async fn scrape(&self, account: &Account) -> Result<()> {
        let mut receipts = self
            .inner
            .capture
            .scrape(account)
            .await
            .map_err(Error::plugin("scrape"))?;

        let inner = Arc::clone(&self.inner);
        let label = account.to_string();
        self.background.lock().spawn(async move {
            let mut delivered = 0usize;
            let mut failed = 0usize;
            let mut first_error = None;
            while let Some(receipt) = receipts.recv().await {
                let id = receipt.id.clone();
                match inner.add_receipt(receipt).await {
                    Ok(_) => delivered += 1,
                    Err(e) => {
                        warn!(
                            account = %label,
                            receipt = %id,
                            error = %e,
                            "Scraped receipt failed"
                        );
                        failed += 1;
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
            }
            debug!(account = %label, delivered, failed, "Scrape finished");
            first_error.map_or(Ok(()), Err)
        });

        Ok(())
    }

    /// Run the decision loop for an event
    pub async fn process(
        &self,
        event: DomainEvent,
        details: EventDetails<'_>,
    ) -> Result<Vec<HistoryEvent>> {
        self.inner.process(event, details).await
    }

    /// Admit a receipt obtained outside the service
    pub async fn add_receipt(&self, receipt: Receipt) -> Result<ScanOutcome> {
        self.inner.add_receipt(receipt).await
    }

    /// Register an account listener; returns `true` if `id` was replaced
    pub fn on_account<F>(&self, id: impl Into<String>, listener: F) -> bool
    where
        F: Fn(&Account, AccountChange) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner
            .account_listeners
            .write()
            .register(id, Arc::new(listener))
    }

    /// Remove an account listener
    pub fn off_account(&self, id: &str) -> bool {
        self.inner.account_listeners.write().unregister(id)
    }

    /// Register a receipt listener; returns `true` if `id` was replaced
    pub fn on_receipt<F>(&self, id: impl Into<String>, listener: F) -> bool
    where
        F: Fn(&Receipt) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner
            .receipt_listeners
            .write()
            .register(id, Arc::new(listener))
    }

    /// Remove a receipt listener
    pub fn off_receipt(&self, id: &str) -> bool {
        self.inner.receipt_listeners.write().unregister(id)
    }

    /// Snapshot of the account cache
    pub fn cached_accounts(&self) -> Vec<Account> {
        self.inner.accounts.read().clone()
    }

    /// Snapshot of the reward history
    pub fn history(&self) -> Vec<HistoryEvent> {
        self.inner.history.snapshot()
    }

    /// Sum of all rewards issued by this service
    pub fn total_rewarded(&self) -> Decimal {
        self.inner.history.total()
    }

    /// Active consent title
    pub async fn consent(&self) -> Result<Title> {
        self.inner.consent().await
    }

    /// Licenses known to the ledger
    pub async fn licenses(&self) -> Result<Vec<License>> {
        self.inner
            .ledger
            .licenses()
            .await
            .map_err(Error::plugin("licenses"))
    }

    /// Payables recorded on the ledger
    pub async fn payables(&self) -> Result<Vec<Payable>> {
        self.inner
            .ledger
            .payables()
            .await
            .map_err(Error::plugin("payables"))
    }

    /// Receipts stored on the ledger
    pub async fn ledger_receipts(&self) -> Result<Vec<Receipt>> {
        self.inner
            .ledger
            .receipts()
            .await
            .map_err(Error::plugin("receipts"))
    }

    /// Service configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Service metrics
    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    /// Wait for all background scans and scrapes; returns the number that failed
    pub async fn wait_background(&self) -> usize {
        let mut failed = 0;
        loop {
            let mut tasks = std::mem::take(&mut *self.background.lock());
            if tasks.is_empty() {
                break;
            }
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(error = %e, "Background task failed");
                        failed += 1;
                    }
                    Err(e) => {
                        warn!(error = %e, "Background task aborted");
                        failed += 1;
                    }
                }
            }
        }
        failed
    }

    /// Abort background work, drop listeners and clear the account cache
    pub async fn shutdown(self) {
        let mut tasks = std::mem::take(&mut *self.background.lock());
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}

        self.inner.account_listeners.write().clear();
        self.inner.receipt_listeners.write().clear();
        self.inner.accounts.write().clear();
        info!(
            rewards = self.inner.history.len(),
            total = %self.inner.history.total(),
            "Reward service shut down"
        );
    }

    fn spawn_online_scan(&self, account: Account) {
        let inner = Arc::clone(&self.inner);
        self.background.lock().spawn(async move {
            inner.online_scan(account).await.map(|_| ())
        });
    }
}

impl fmt::Debug for RewardService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewardService")
            .field("service", &self.inner.config.service_name)
            .field("rules", &self.inner.rules.len())
            .field("accounts", &self.inner.accounts.read().len())
            .field("history", &self.inner.history.len())
            .finish()
    }
}

impl Inner {
    async fn consent(&self) -> Result<Title> {
        let license_id = &self.config.consent.license_id;
        let missing = || Error::ConsentMissing {
            license_id: license_id.clone(),
        };

        let license = self
            .ledger
            .license(license_id)
            .await
            .map_err(Error::plugin("license"))?
            .ok_or_else(missing)?;

        let title = self
            .ledger
            .title(&license.id)
            .await
            .map_err(Error::plugin("title"))?
            .ok_or_else(missing)?;

        if !title.is_active(Utc::now()) {
            return Err(missing());
        }

        Ok(title)
    }

    async fn physical_scan(&self) -> Result<ScanOutcome> {
        self.consent().await?;

        let receipt = self
            .capture
            .scan(ScanMode::Physical, None)
            .await
            .map_err(Error::plugin("scan"))?;

        let threshold = self.config.scan.ocr_confidence_threshold;
        if !receipt.meets_confidence(threshold) {
            let reason = RejectionReason::LowConfidence {
                confidence: receipt.ocr_confidence,
                threshold,
            };
            warn!(receipt = %receipt.id, %reason, "Receipt dropped");
            self.metrics.record_rejected(&reason);
            return Ok(ScanOutcome::Rejected { receipt, reason });
        }

        self.add_receipt(receipt).await
    }

    // No confidence gate on this path; physical scans apply one.
    async fn online_scan(&self, account: Account) -> Result<ScanOutcome> {
        let mut receipt = self
            .capture
            .scan(ScanMode::Online, Some(&account))
            .await
            .map_err(Error::plugin("scan"))?;

        if receipt.account.is_none() {
            receipt.account = Some(account);
        }

        self.add_receipt(receipt).await
    }

    async fn add_receipt(&self, receipt: Receipt) -> Result<ScanOutcome> {
        if let Some(reason) = receipt.rejection() {
            warn!(receipt = %receipt.id, %reason, "Receipt dropped");
            self.metrics.record_rejected(&reason);
            return Ok(ScanOutcome::Rejected { receipt, reason });
        }

        self.process(DomainEvent::Scan, EventDetails::for_receipt(&receipt))
            .await?;
        self.metrics.record_admitted();

        let listeners = self.receipt_listeners.read().snapshot();
        listeners.run(|listener| listener(&receipt))?;

        Ok(ScanOutcome::Admitted(receipt))
    }

    async fn process(
        &self,
        event: DomainEvent,
        details: EventDetails<'_>,
    ) -> Result<Vec<HistoryEvent>> {
        if self.config.consent.enforce_on_payouts {
            self.consent().await?;
        }

        let mut issued = Vec::new();
        for rule in &self.rules {
            if !rule.handles(event) {
                continue;
            }

            self.metrics.record_rule_evaluation();
            let amount = match rule.evaluate(event, &details) {
                Some(amount) if amount > Decimal::ZERO => amount,
                Some(amount) => {
                    warn!(rule = rule.name(), %event, %amount, "Ignoring non-positive reward");
                    continue;
                }
                None => continue,
            };

            let receipt_id = details.receipt.map(|receipt| receipt.id.clone());
            let record = HistoryEvent::new(
                amount,
                event,
                details.provider(),
                rule.name(),
                receipt_id.clone(),
            );

            let payable = self
                .ledger
                .create_payable(PayableRequest {
                    amount,
                    description: event.as_str().to_string(),
                    external_receipt_id: receipt_id,
                })
                .await
                .map_err(Error::plugin("create_payable"))?;

            info!(
                rule = rule.name(),
                %event,
                %amount,
                payable_id = %payable.id,
                "Reward issued"
            );
            let record = record.with_payable(payable.id);
            self.metrics.record_payable(event, amount);
            self.history.append(record.clone());
            issued.push(record);
        }

        Ok(issued)
    }

    fn notify_account(&self, account: &Account, change: AccountChange) -> Result<()> {
        let listeners = self.account_listeners.read().snapshot();
        listeners.run(|listener| listener(account, change))
    }
}

fn normalize(raw: RawAccount) -> Option<Account> {
    match Account::try_from(raw) {
        Ok(account) => Some(account),
        Err(e) => {
            warn!(error = %e, "Skipping persisted account");
            None
        }
    }
}
