//! Rule sets driving the reward service end to end

use proptest::prelude::*;
use reward_rules::{ReceiptPercentReward, RuleSet};
use rewards_core::{
    clients::{MemoryCaptureClient, MemoryLedgerClient},
    Account, Config, DomainEvent, EventDetails, Provider, Receipt, RewardRule, RewardService,
};
use rust_decimal::Decimal;
use std::sync::Arc;

const RULES: &str = r#"
[[rules]]
type = "fixed"
name = "link-bonus"
event = "LINK"
amount = "1.00"

[[rules]]
type = "fixed"
name = "scan-bonus"
event = "SCAN"
amount = "2.00"

[[rules]]
type = "account_kind"
name = "retailer-link"
event = "LINK"
kind = "retailer"
amount = "3.00"

[[rules]]
type = "merchant"
name = "grocery"
merchants = ["Kroger", "Safeway"]
amount = "0.50"

[[rules]]
type = "receipt_percent"
name = "cashback"
percent = "1"
cap = "2.00"
"#;

fn service() -> (RewardService, Arc<MemoryLedgerClient>) {
    let rules = RuleSet::from_toml_str(RULES).unwrap().into_rules().unwrap();
    let ledger = Arc::new(MemoryLedgerClient::default());
    let service = RewardService::new(
        Config::default(),
        Arc::new(MemoryCaptureClient::new()),
        ledger.clone(),
        rules,
    )
    .unwrap();
    (service, ledger)
}

#[tokio::test]
async fn test_email_link_pays_base_bonus_only() {
    let (service, ledger) = service();
    service
        .login(Account::new("me@gmail.com", Provider::Gmail))
        .await
        .unwrap();

    let payables = ledger.recorded_payables();
    assert_eq!(payables.len(), 1);
    assert_eq!(payables[0].amount, Decimal::new(100, 2));
}

#[tokio::test]
async fn test_retailer_link_fans_out() {
    let (service, _) = service();
    service
        .login(Account::new("shopper", Provider::Kroger))
        .await
        .unwrap();

    let rules: Vec<String> = service
        .history()
        .iter()
        .map(|record| record.rule().to_string())
        .collect();
    assert_eq!(rules, vec!["link-bonus", "retailer-link"]);
    assert_eq!(service.total_rewarded(), Decimal::new(400, 2));
}

#[tokio::test]
async fn test_grocery_receipt_collects_every_scan_rule() {
    let (service, ledger) = service();
    let receipt = Receipt::new("r1")
        .with_merchant("kroger")
        .with_total(Decimal::new(4550, 2));

    service.add_receipt(receipt).await.unwrap();

    // 2.00 flat + 0.50 merchant + 1% of 45.50
    let amounts: Vec<Decimal> = ledger
        .recorded_payables()
        .iter()
        .map(|payable| payable.amount)
        .collect();
    assert_eq!(
        amounts,
        vec![Decimal::new(200, 2), Decimal::new(50, 2), Decimal::new(46, 2)]
    );
    assert!(ledger
        .recorded_payables()
        .iter()
        .all(|payable| payable.description == "SCAN"));
}

proptest! {
    /// Property: percent rewards never exceed the cap or the receipt total
    #[test]
    fn prop_percent_reward_bounded(
        total_cents in 0i64..10_000_000i64,
        percent_tenths in 1i64..=1000i64,
        cap_cents in 1i64..100_000i64
    ) {
        let total = Decimal::new(total_cents, 2);
        let cap = Decimal::new(cap_cents, 2);
        let percent = Decimal::new(percent_tenths, 1);
        let rule = ReceiptPercentReward::new("cashback", percent, Some(cap));
        let receipt = Receipt::new("r1").with_total(total);

        let details = EventDetails::for_receipt(&receipt);
        if let Some(amount) = rule.evaluate(DomainEvent::Scan, &details) {
            prop_assert!(amount > Decimal::ZERO);
            prop_assert!(amount <= cap);
            prop_assert!(amount <= total);
            prop_assert!(amount.scale() <= 2);
        }
    }
}
