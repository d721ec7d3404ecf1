//! Rewards Core
//!
//! Orchestration layer between a receipt-capture client and a rewards
//! ledger client. Linked accounts and scanned receipts flow through a
//! configurable reward rule set; every firing rule becomes a payable on
//! the ledger and a record in the local history log.
//!
//! # Architecture
//!
//! ```text
//!   CaptureClient ──► RewardService ──► RewardRule (fan-out)
//!   (login, scan,      │   │                 │
//!    scrape)           │   │                 ▼
//!                      │   └──────────► LedgerClient::create_payable
//!                      │                     │
//!                      ▼                     ▼
//!               account/receipt          HistoryLog
//!                  listeners
//! ```
//!
//! # Invariants
//!
//! - Duplicate or fraudulent receipts never reach a reward rule
//! - Every firing rule issues exactly one payable and one history record
//! - History records are append-only and never mutated

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod account;
pub mod clients;
pub mod config;
pub mod error;
pub mod history;
pub mod listeners;
pub mod metrics;
pub mod rules;
pub mod service;
pub mod types;

// Re-exports
pub use account::{Account, AccountKind, Provider, RawAccount, Secret};
pub use clients::{CaptureClient, ClientError, ClientResult, LedgerClient};
pub use config::Config;
pub use error::{Error, Result};
pub use history::HistoryLog;
pub use rules::{EventDetails, FnRule, RewardRule};
pub use service::{AccountChange, RewardService};
pub use types::{DomainEvent, HistoryEvent, Receipt, RejectionReason, ScanMode, ScanOutcome};
