//! Reward rule contract
//!
//! A rule maps a domain event (plus the account/receipt involved) to an
//! optional amount. The service evaluates every rule on every event it
//! handles; several rules may pay out for the same event.

use crate::account::{Account, Provider};
use crate::types::{DomainEvent, Receipt};
use rust_decimal::Decimal;
use std::fmt;

/// Context passed to a rule alongside the event
#[derive(Debug, Clone, Copy, Default)]
pub struct EventDetails<'a> {
    /// Receipt that triggered a SCAN
    pub receipt: Option<&'a Receipt>,

    /// Account involved (linked/unlinked account, or the receipt's account)
    pub account: Option<&'a Account>,
}

impl<'a> EventDetails<'a> {
    /// Details for an account event
    pub fn for_account(account: &'a Account) -> Self {
        Self {
            receipt: None,
            account: Some(account),
        }
    }

    /// Details for a receipt event
    pub fn for_receipt(receipt: &'a Receipt) -> Self {
        Self {
            receipt: Some(receipt),
            account: receipt.account.as_ref(),
        }
    }

    /// Provider of the account involved
    pub fn provider(&self) -> Option<Provider> {
        self.account.map(|account| account.provider)
    }
}

/// Reward rule
pub trait RewardRule: Send + Sync {
    /// Rule name, recorded in the history log
    fn name(&self) -> &str;

    /// Whether the rule wants to see this event
    fn handles(&self, event: DomainEvent) -> bool;

    /// Amount to pay, or `None` for no payout
    fn evaluate(&self, event: DomainEvent, details: &EventDetails<'_>) -> Option<Decimal>;
}

impl fmt::Debug for dyn RewardRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewardRule").field("name", &self.name()).finish()
    }
}

/// Rule backed by a closure
pub struct FnRule<F> {
    name: String,
    events: Vec<DomainEvent>,
    evaluate: F,
}

impl<F> FnRule<F>
where
    F: Fn(DomainEvent, &EventDetails<'_>) -> Option<Decimal> + Send + Sync,
{
    /// Create a rule interested in the given events
    pub fn new(
        name: impl Into<String>,
        events: impl IntoIterator<Item = DomainEvent>,
        evaluate: F,
    ) -> Self {
        Self {
            name: name.into(),
            events: events.into_iter().collect(),
            evaluate,
        }
    }
}

impl<F> fmt::Debug for FnRule<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRule")
            .field("name", &self.name)
            .field("events", &self.events)
            .finish()
    }
}

impl<F> RewardRule for FnRule<F>
where
    F: Fn(DomainEvent, &EventDetails<'_>) -> Option<Decimal> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handles(&self, event: DomainEvent) -> bool {
        self.events.contains(&event)
    }

    fn evaluate(&self, event: DomainEvent, details: &EventDetails<'_>) -> Option<Decimal> {
        (self.evaluate)(event, details)
    }
}
