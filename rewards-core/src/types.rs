//! Core types for reward issuance
//!
//! Money is always `Decimal`; receipts are transient values produced by the
//! capture client and are never persisted by this crate.

use crate::account::{Account, Provider};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Domain event that can trigger a reward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    /// Account linked
    Link,
    /// Account unlinked
    Unlink,
    /// Receipt scanned or scraped
    Scan,
}

impl DomainEvent {
    /// Event name, also used as the payable description
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainEvent::Link => "LINK",
            DomainEvent::Unlink => "UNLINK",
            DomainEvent::Scan => "SCAN",
        }
    }
}

impl fmt::Display for DomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scan mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanMode {
    /// Camera scan of a paper receipt
    Physical,
    /// Email/retailer scan for a linked account
    Online,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Physical => write!(f, "PHYSICAL"),
            ScanMode::Online => write!(f, "ONLINE"),
        }
    }
}

/// Receipt produced by the capture client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    /// External receipt id assigned by the capture client
    pub id: String,

    /// OCR confidence in [0, 1]
    pub ocr_confidence: f64,

    /// Flagged as a duplicate of an earlier receipt
    #[serde(default)]
    pub duplicate: bool,

    /// Flagged as fraudulent
    #[serde(default)]
    pub fraudulent: bool,

    /// Account the receipt was found in (online scans and scrapes)
    #[serde(default)]
    pub account: Option<Account>,

    /// Merchant name
    #[serde(default)]
    pub merchant: Option<String>,

    /// Receipt total
    #[serde(default)]
    pub total: Option<Decimal>,

    /// Capture timestamp
    pub captured_at: DateTime<Utc>,
}

impl Receipt {
    /// Clean receipt with full confidence
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ocr_confidence: 1.0,
            duplicate: false,
            fraudulent: false,
            account: None,
            merchant: None,
            total: None,
            captured_at: Utc::now(),
        }
    }

    /// Set OCR confidence (clamped to [0, 1])
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.ocr_confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Attach the source account
    pub fn with_account(mut self, account: Account) -> Self {
        self.account = Some(account);
        self
    }

    /// Set merchant name
    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = Some(merchant.into());
        self
    }

    /// Set receipt total
    pub fn with_total(mut self, total: Decimal) -> Self {
        self.total = Some(total);
        self
    }

    /// Set capture time
    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = captured_at;
        self
    }

    /// Flag as duplicate
    pub fn mark_duplicate(mut self) -> Self {
        self.duplicate = true;
        self
    }

    /// Flag as fraudulent
    pub fn mark_fraudulent(mut self) -> Self {
        self.fraudulent = true;
        self
    }

    /// Reason this receipt must not be rewarded, if any
    pub fn rejection(&self) -> Option<RejectionReason> {
        if self.duplicate {
            Some(RejectionReason::Duplicate)
        } else if self.fraudulent {
            Some(RejectionReason::Fraudulent)
        } else {
            None
        }
    }

    /// Confidence strictly above the threshold
    pub fn meets_confidence(&self, threshold: f64) -> bool {
        self.ocr_confidence > threshold
    }

    /// Provider of the source account
    pub fn provider(&self) -> Option<Provider> {
        self.account.as_ref().map(|account| account.provider)
    }
}

/// Why a receipt was dropped before reward issuance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RejectionReason {
    /// Duplicate of an earlier receipt
    Duplicate,
    /// Flagged as fraudulent
    Fraudulent,
    /// OCR confidence at or below the threshold
    LowConfidence {
        /// Receipt confidence
        confidence: f64,
        /// Configured threshold
        threshold: f64,
    },
}

impl RejectionReason {
    /// Metrics label
    pub fn label(&self) -> &'static str {
        match self {
            RejectionReason::Duplicate => "duplicate",
            RejectionReason::Fraudulent => "fraudulent",
            RejectionReason::LowConfidence { .. } => "low_confidence",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::Duplicate => write!(f, "duplicate receipt"),
            RejectionReason::Fraudulent => write!(f, "fraudulent receipt"),
            RejectionReason::LowConfidence {
                confidence,
                threshold,
            } => write!(
                f,
                "OCR confidence {:.2} not above threshold {:.2}",
                confidence, threshold
            ),
        }
    }
}

/// Result of a scan request
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// Receipt passed admission and went through the decision loop
    Admitted(Receipt),
    /// Receipt was filtered out; not an error
    Rejected {
        /// The dropped receipt
        receipt: Receipt,
        /// Why it was dropped
        reason: RejectionReason,
    },
}

impl ScanOutcome {
    /// Whether the receipt was admitted
    pub fn is_admitted(&self) -> bool {
        matches!(self, ScanOutcome::Admitted(_))
    }

    /// The scanned receipt, admitted or not
    pub fn receipt(&self) -> &Receipt {
        match self {
            ScanOutcome::Admitted(receipt) => receipt,
            ScanOutcome::Rejected { receipt, .. } => receipt,
        }
    }
}

/// Record of a reward issuance
///
/// Created once by the decision loop and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    id: Uuid,
    amount: Decimal,
    timestamp: DateTime<Utc>,
    event: DomainEvent,
    provider: Option<Provider>,
    rule: String,
    receipt_id: Option<String>,
    #[serde(default)]
    payable_id: Option<Uuid>,
}

impl HistoryEvent {
    /// Create a record stamped with the current time
    pub fn new(
        amount: Decimal,
        event: DomainEvent,
        provider: Option<Provider>,
        rule: impl Into<String>,
        receipt_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            amount,
            timestamp: Utc::now(),
            event,
            provider,
            rule: rule.into(),
            receipt_id,
            payable_id: None,
        }
    }

    /// Attach the ledger payable issued for this record
    pub fn with_payable(mut self, payable_id: Uuid) -> Self {
        self.payable_id = Some(payable_id);
        self
    }

    /// Record id (UUIDv7, time-ordered)
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Rewarded amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Issuance time
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Triggering event
    pub fn event(&self) -> DomainEvent {
        self.event
    }

    /// Provider of the account involved, if any
    pub fn provider(&self) -> Option<Provider> {
        self.provider
    }

    /// Name of the rule that fired
    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// External id of the rewarded receipt
    pub fn receipt_id(&self) -> Option<&str> {
        self.receipt_id.as_deref()
    }

    /// Ledger payable issued for this record
    pub fn payable_id(&self) -> Option<Uuid> {
        self.payable_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_event_names() {
        assert_eq!(DomainEvent::Link.to_string(), "LINK");
        assert_eq!(DomainEvent::Unlink.as_str(), "UNLINK");
        assert_eq!(
            serde_json::to_string(&DomainEvent::Scan).unwrap(),
            "\"SCAN\""
        );
    }

    #[test]
    fn test_receipt_rejection() {
        assert_eq!(Receipt::new("r1").rejection(), None);
        assert_eq!(
            Receipt::new("r2").mark_duplicate().rejection(),
            Some(RejectionReason::Duplicate)
        );
        assert_eq!(
            Receipt::new("r3").mark_fraudulent().rejection(),
            Some(RejectionReason::Fraudulent)
        );
    }

    #[test]
    fn test_confidence_is_strictly_greater() {
        let receipt = Receipt::new("r1").with_confidence(0.9);
        assert!(!receipt.meets_confidence(0.9));
        assert!(receipt.meets_confidence(0.89));
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(Receipt::new("r1").with_confidence(1.7).ocr_confidence, 1.0);
        assert_eq!(Receipt::new("r1").with_confidence(-0.2).ocr_confidence, 0.0);
    }

    #[test]
    fn test_history_event_fields() {
        let record = HistoryEvent::new(
            Decimal::new(150, 2),
            DomainEvent::Scan,
            Some(Provider::Gmail),
            "scan-bonus",
            Some("rcpt-1".to_string()),
        );

        assert_eq!(record.amount(), Decimal::new(150, 2));
        assert_eq!(record.event(), DomainEvent::Scan);
        assert_eq!(record.provider(), Some(Provider::Gmail));
        assert_eq!(record.rule(), "scan-bonus");
        assert_eq!(record.receipt_id(), Some("rcpt-1"));
    }

    #[test]
    fn test_rejection_labels() {
        let low = RejectionReason::LowConfidence {
            confidence: 0.5,
            threshold: 0.9,
        };
        assert_eq!(low.label(), "low_confidence");
        assert!(low.to_string().contains("0.50"));
    }
}
