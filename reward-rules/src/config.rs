//! Rule set configuration
//!
//! Rules are declared as an ordered `[[rules]]` array. The order is the
//! evaluation order used by the service.

use crate::rules::{
    AccountKindReward, FixedReward, MerchantReward, ProviderReward, ReceiptPercentReward,
    RecentReceiptReward,
};
use crate::{Error, Result};
use chrono::Duration;
use rewards_core::{AccountKind, DomainEvent, Provider, RewardRule};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// One configured rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleConfig {
    /// Flat amount per event
    Fixed {
        /// Rule name (defaults to a generated one)
        #[serde(default)]
        name: Option<String>,
        /// Triggering event
        event: DomainEvent,
        /// Amount paid
        amount: Decimal,
    },

    /// Flat amount for accounts of some providers
    Provider {
        /// Rule name
        #[serde(default)]
        name: Option<String>,
        /// Triggering event
        event: DomainEvent,
        /// Providers that qualify
        providers: Vec<Provider>,
        /// Amount paid
        amount: Decimal,
    },

    /// Flat amount for email-only or retailer-only accounts
    AccountKind {
        /// Rule name
        #[serde(default)]
        name: Option<String>,
        /// Triggering event
        event: DomainEvent,
        /// Account kind that qualifies
        kind: AccountKind,
        /// Amount paid
        amount: Decimal,
    },

    /// Flat amount for scanned receipts from some merchants
    Merchant {
        /// Rule name
        #[serde(default)]
        name: Option<String>,
        /// Merchant names
        merchants: Vec<String>,
        /// Amount paid
        amount: Decimal,
    },

    /// Percentage of the scanned receipt total
    ReceiptPercent {
        /// Rule name
        #[serde(default)]
        name: Option<String>,
        /// Percent in (0, 100]
        percent: Decimal,
        /// Upper bound on the amount
        #[serde(default)]
        cap: Option<Decimal>,
    },

    /// Flat amount for scanned receipts captured within a window
    RecentReceipt {
        /// Rule name
        #[serde(default)]
        name: Option<String>,
        /// Maximum receipt age in days
        max_age_days: u32,
        /// Amount paid
        amount: Decimal,
    },
}

impl RuleConfig {
    /// Configured name, or one derived from the rule type and its position
    pub fn name(&self, index: usize) -> String {
        let (explicit, kind) = match self {
            RuleConfig::Fixed { name, .. } => (name, "fixed"),
            RuleConfig::Provider { name, .. } => (name, "provider"),
            RuleConfig::AccountKind { name, .. } => (name, "account_kind"),
            RuleConfig::Merchant { name, .. } => (name, "merchant"),
            RuleConfig::ReceiptPercent { name, .. } => (name, "receipt_percent"),
            RuleConfig::RecentReceipt { name, .. } => (name, "recent_receipt"),
        };
        explicit
            .clone()
            .unwrap_or_else(|| format!("{}-{}", kind, index))
    }

    /// Check amounts and percentages
    pub fn validate(&self, name: &str) -> Result<()> {
        match self {
            RuleConfig::Fixed { amount, .. } | RuleConfig::AccountKind { amount, .. } => {
                check_amount(name, *amount)
            }
            RuleConfig::Provider {
                providers, amount, ..
            } => {
                if providers.is_empty() {
                    return Err(Error::invalid(name, "provider list is empty"));
                }
                check_amount(name, *amount)
            }
            RuleConfig::Merchant {
                merchants, amount, ..
            } => {
                if merchants.iter().all(|m| m.trim().is_empty()) {
                    return Err(Error::invalid(name, "merchant list is empty"));
                }
                check_amount(name, *amount)
            }
            RuleConfig::ReceiptPercent { percent, cap, .. } => {
                if *percent <= Decimal::ZERO || *percent > Decimal::ONE_HUNDRED {
                    return Err(Error::invalid(
                        name,
                        format!("percent {} outside (0, 100]", percent),
                    ));
                }
                match cap {
                    Some(cap) => check_amount(name, *cap),
                    None => Ok(()),
                }
            }
            RuleConfig::RecentReceipt {
                max_age_days,
                amount,
                ..
            } => {
                if *max_age_days == 0 {
                    return Err(Error::invalid(name, "max_age_days must be at least 1"));
                }
                check_amount(name, *amount)
            }
        }
    }

    /// Build the rule
    pub fn build(&self, name: String) -> Arc<dyn RewardRule> {
        match self {
            RuleConfig::Fixed { event, amount, .. } => {
                Arc::new(FixedReward::new(name, *event, *amount))
            }
            RuleConfig::Provider {
                event,
                providers,
                amount,
                ..
            } => Arc::new(ProviderReward::new(
                name,
                *event,
                providers.iter().copied(),
                *amount,
            )),
            RuleConfig::AccountKind {
                event,
                kind,
                amount,
                ..
            } => Arc::new(AccountKindReward::new(name, *event, *kind, *amount)),
            RuleConfig::Merchant {
                merchants, amount, ..
            } => Arc::new(MerchantReward::new(name, merchants, *amount)),
            RuleConfig::ReceiptPercent { percent, cap, .. } => {
                Arc::new(ReceiptPercentReward::new(name, *percent, *cap))
            }
            RuleConfig::RecentReceipt {
                max_age_days,
                amount,
                ..
            } => Arc::new(RecentReceiptReward::new(
                name,
                Duration::days(i64::from(*max_age_days)),
                *amount,
            )),
        }
    }
}

fn check_amount(name: &str, amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::invalid(
            name,
            format!("amount must be positive, got {}", amount),
        ));
    }
    Ok(())
}

/// Ordered rule set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Rules in evaluation order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl RuleSet {
    /// Rule set from configs
    pub fn new(rules: Vec<RuleConfig>) -> Self {
        Self { rules }
    }

    /// Load rule set from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML rule set
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let set: RuleSet = toml::from_str(content)?;
        set.validate()?;
        Ok(set)
    }

    /// Validate every rule and reject duplicate names
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (index, rule) in self.rules.iter().enumerate() {
            let name = rule.name(index);
            rule.validate(&name)?;
            if !seen.insert(name.clone()) {
                return Err(Error::DuplicateName(name));
            }
        }
        Ok(())
    }

    /// Validate and build the rules in order
    pub fn into_rules(self) -> Result<Vec<Arc<dyn RewardRule>>> {
        self.validate()?;

        let rules: Vec<Arc<dyn RewardRule>> = self
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| rule.build(rule.name(index)))
            .collect();

        info!(count = rules.len(), "Reward rules loaded");
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[[rules]]
type = "fixed"
name = "link-bonus"
event = "LINK"
amount = "1.00"

[[rules]]
type = "provider"
event = "SCAN"
providers = ["amazon", "walmart"]
amount = "0.25"

[[rules]]
type = "receipt_percent"
percent = "2.5"
cap = "5.00"
"#;

    #[test]
    fn test_parse_rule_set() {
        let set = RuleSet::from_toml_str(SAMPLE).unwrap();
        assert_eq!(set.rules.len(), 3);
        assert_eq!(
            set.rules[0],
            RuleConfig::Fixed {
                name: Some("link-bonus".to_string()),
                event: DomainEvent::Link,
                amount: Decimal::new(100, 2),
            }
        );
    }

    #[test]
    fn test_into_rules_keeps_order_and_names() {
        let rules = RuleSet::from_toml_str(SAMPLE).unwrap().into_rules().unwrap();
        let names: Vec<&str> = rules.iter().map(|rule| rule.name()).collect();
        assert_eq!(names, vec!["link-bonus", "provider-1", "receipt_percent-2"]);
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let toml = r#"
[[rules]]
type = "fixed"
event = "SCAN"
amount = "0"
"#;
        let err = RuleSet::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, Error::InvalidRule { .. }));
    }

    #[test]
    fn test_percent_out_of_range() {
        let toml = r#"
[[rules]]
type = "receipt_percent"
percent = "150"
"#;
        assert!(RuleSet::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_duplicate_names() {
        let toml = r#"
[[rules]]
type = "fixed"
name = "bonus"
event = "LINK"
amount = "1"

[[rules]]
type = "fixed"
name = "bonus"
event = "SCAN"
amount = "1"
"#;
        let err = RuleSet::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(ref name) if name == "bonus"));
    }

    #[test]
    fn test_unknown_rule_type() {
        let toml = r#"
[[rules]]
type = "lottery"
amount = "100"
"#;
        assert!(matches!(
            RuleSet::from_toml_str(toml),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_recent_receipt_rule() {
        let toml = r#"
[[rules]]
type = "recent_receipt"
max_age_days = 14
amount = "0.40"
"#;
        let set = RuleSet::from_toml_str(toml).unwrap();
        assert_eq!(
            set.rules[0],
            RuleConfig::RecentReceipt {
                name: None,
                max_age_days: 14,
                amount: Decimal::new(40, 2),
            }
        );
        let rules = set.into_rules().unwrap();
        assert_eq!(rules[0].name(), "recent_receipt-0");

        let zero = toml.replace("14", "0");
        assert!(matches!(
            RuleSet::from_toml_str(&zero),
            Err(Error::InvalidRule { .. })
        ));
    }

    #[test]
    fn test_empty_set() {
        let set = RuleSet::from_toml_str("").unwrap();
        assert!(set.into_rules().unwrap().is_empty());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let set = RuleSet::from_file(file.path()).unwrap();
        assert_eq!(set.rules.len(), 3);
    }
}
