//! Reward Rules
//!
//! Configuration-driven implementations of [`rewards_core::RewardRule`]
//! and a TOML loader for ordered rule sets.
//!
//! ```toml
//! [[rules]]
//! type = "fixed"
//! event = "LINK"
//! amount = "1.00"
//!
//! [[rules]]
//! type = "receipt_percent"
//! percent = "2.5"
//! cap = "5.00"
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod rules;

pub use config::{RuleConfig, RuleSet};
pub use error::{Error, Result};
pub use rules::{
    AccountKindReward, FixedReward, MerchantReward, ProviderReward, ReceiptPercentReward,
    RecentReceiptReward,
};
