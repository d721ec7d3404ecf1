//! Built-in reward rules

use chrono::{Duration, Utc};
use rewards_core::{AccountKind, DomainEvent, EventDetails, Provider, RewardRule};
use rust_decimal::{Decimal, RoundingStrategy};

/// Flat amount for every occurrence of an event
#[derive(Debug, Clone)]
pub struct FixedReward {
    name: String,
    event: DomainEvent,
    amount: Decimal,
}

impl FixedReward {
    /// Create rule
    pub fn new(name: impl Into<String>, event: DomainEvent, amount: Decimal) -> Self {
        Self {
            name: name.into(),
            event,
            amount,
        }
    }
}

impl RewardRule for FixedReward {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles(&self, event: DomainEvent) -> bool {
        event == self.event
    }

    fn evaluate(&self, _event: DomainEvent, _details: &EventDetails<'_>) -> Option<Decimal> {
        Some(self.amount)
    }
}

/// Pays only for accounts of the listed providers
#[derive(Debug, Clone)]
pub struct ProviderReward {
    name: String,
    event: DomainEvent,
    providers: Vec<Provider>,
    amount: Decimal,
}

impl ProviderReward {
    /// Create rule
    pub fn new(
        name: impl Into<String>,
        event: DomainEvent,
        providers: impl IntoIterator<Item = Provider>,
        amount: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            event,
            providers: providers.into_iter().collect(),
            amount,
        }
    }
}

impl RewardRule for ProviderReward {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles(&self, event: DomainEvent) -> bool {
        event == self.event
    }

    fn evaluate(&self, _event: DomainEvent, details: &EventDetails<'_>) -> Option<Decimal> {
        let provider = details.provider()?;
        self.providers.contains(&provider).then_some(self.amount)
    }
}

/// Pays only for email accounts, or only for retailer accounts
#[derive(Debug, Clone)]
pub struct AccountKindReward {
    name: String,
    event: DomainEvent,
    kind: AccountKind,
    amount: Decimal,
}

impl AccountKindReward {
    /// Create rule
    pub fn new(
        name: impl Into<String>,
        event: DomainEvent,
        kind: AccountKind,
        amount: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            event,
            kind,
            amount,
        }
    }
}

impl RewardRule for AccountKindReward {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles(&self, event: DomainEvent) -> bool {
        event == self.event
    }

    fn evaluate(&self, _event: DomainEvent, details: &EventDetails<'_>) -> Option<Decimal> {
        let account = details.account?;
        (account.kind() == self.kind).then_some(self.amount)
    }
}

/// Flat amount for receipts from the listed merchants
#[derive(Debug, Clone)]
pub struct MerchantReward {
    name: String,
    merchants: Vec<String>,
    amount: Decimal,
}

impl MerchantReward {
    /// Create rule; merchant names match case-insensitively
    pub fn new<I, S>(name: impl Into<String>, merchants: I, amount: Decimal) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.into(),
            merchants: merchants
                .into_iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .collect(),
            amount,
        }
    }
}

impl RewardRule for MerchantReward {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles(&self, event: DomainEvent) -> bool {
        event == DomainEvent::Scan
    }

    fn evaluate(&self, _event: DomainEvent, details: &EventDetails<'_>) -> Option<Decimal> {
        let merchant = details.receipt?.merchant.as_deref()?.trim().to_lowercase();
        self.merchants.contains(&merchant).then_some(self.amount)
    }
}

/// Percentage of the receipt total, rounded to cents
#[derive(Debug, Clone)]
pub struct ReceiptPercentReward {
    name: String,
    percent: Decimal,
    cap: Option<Decimal>,
}

impl ReceiptPercentReward {
    /// Create rule
    pub fn new(name: impl Into<String>, percent: Decimal, cap: Option<Decimal>) -> Self {
        Self {
            name: name.into(),
            percent,
            cap,
        }
    }
}

impl RewardRule for ReceiptPercentReward {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles(&self, event: DomainEvent) -> bool {
        event == DomainEvent::Scan
    }

    fn evaluate(&self, _event: DomainEvent, details: &EventDetails<'_>) -> Option<Decimal> {
        let total = details.receipt?.total?;
        let amount = (total * self.percent / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let amount = match self.cap {
            Some(cap) => amount.min(cap),
            None => amount,
        };

        (amount > Decimal::ZERO).then_some(amount)
    }
}

/// Flat amount for receipts captured within a recent window
#[derive(Debug, Clone)]
pub struct RecentReceiptReward {
    name: String,
    max_age: Duration,
    amount: Decimal,
}

impl RecentReceiptReward {
    /// Create rule paying for receipts no older than `max_age`
    pub fn new(name: impl Into<String>, max_age: Duration, amount: Decimal) -> Self {
        Self {
            name: name.into(),
            max_age,
            amount,
        }
    }
}

impl RewardRule for RecentReceiptReward {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles(&self, event: DomainEvent) -> bool {
        event == DomainEvent::Scan
    }

    fn evaluate(&self, _event: DomainEvent, details: &EventDetails<'_>) -> Option<Decimal> {
        let age = Utc::now() - details.receipt?.captured_at;
        (age <= self.max_age).then_some(self.amount)
    }
}
