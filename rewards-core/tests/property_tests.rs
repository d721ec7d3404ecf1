//! Property-based tests for reward invariants
//!
//! - Fan-out: one payable and one history record per rule returning a positive amount
//! - Admission: duplicate or fraudulent receipts never pay
//! - Confidence gate: physical receipts pay only strictly above the threshold
//! - Logout filter: surviving cache entries differ from the target in both fields

use proptest::prelude::*;
use rewards_core::{
    clients::{MemoryCaptureClient, MemoryLedgerClient},
    Account, Config, DomainEvent, FnRule, Provider, Receipt, RewardRule, RewardService, ScanMode,
};
use rust_decimal::Decimal;
use std::sync::Arc;

fn provider_strategy() -> impl Strategy<Value = Provider> {
    prop_oneof![
        Just(Provider::Gmail),
        Just(Provider::Outlook),
        Just(Provider::Amazon),
        Just(Provider::Walmart),
    ]
}

fn account_strategy() -> impl Strategy<Value = Account> {
    ("[a-c]", provider_strategy()).prop_map(|(name, provider)| Account::new(name, provider))
}

fn build_service(
    rules: Vec<Arc<dyn RewardRule>>,
) -> (RewardService, Arc<MemoryCaptureClient>, Arc<MemoryLedgerClient>) {
    let capture = Arc::new(MemoryCaptureClient::new());
    let ledger = Arc::new(MemoryLedgerClient::default());
    let service =
        RewardService::new(Config::default(), capture.clone(), ledger.clone(), rules).unwrap();
    (service, capture, ledger)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: every rule with a positive amount issues exactly one payable
    #[test]
    fn prop_fan_out_matches_positive_rules(
        amounts in prop::collection::vec(prop::option::of(-500i64..500i64), 0..8)
    ) {
        let rules: Vec<Arc<dyn RewardRule>> = amounts
            .iter()
            .enumerate()
            .map(|(i, cents)| {
                let cents = *cents;
                Arc::new(FnRule::new(format!("rule-{}", i), [DomainEvent::Scan], move |_, _| {
                    cents.map(|c| Decimal::new(c, 2))
                })) as Arc<dyn RewardRule>
            })
            .collect();

        let expected: Vec<i64> = amounts.iter().flatten().copied().filter(|c| *c > 0).collect();
        let expected_total = expected
            .iter()
            .fold(Decimal::ZERO, |acc, c| acc + Decimal::new(*c, 2));

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (service, _, ledger) = build_service(rules);
            let outcome = service.add_receipt(Receipt::new("r1")).await.unwrap();

            prop_assert!(outcome.is_admitted());
            prop_assert_eq!(service.history().len(), expected.len());
            prop_assert_eq!(ledger.recorded_payables().len(), expected.len());
            prop_assert_eq!(service.total_rewarded(), expected_total);
            Ok(())
        })?;
    }

    /// Property: duplicate or fraudulent receipts never reach the rules
    #[test]
    fn prop_rejected_receipts_never_pay(duplicate in any::<bool>(), fraudulent in any::<bool>()) {
        let rule: Arc<dyn RewardRule> = Arc::new(FnRule::new(
            "scan",
            [DomainEvent::Scan],
            |_, _| Some(Decimal::ONE),
        ));

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (service, _, ledger) = build_service(vec![rule]);
            let mut receipt = Receipt::new("r1");
            if duplicate {
                receipt = receipt.mark_duplicate();
            }
            if fraudulent {
                receipt = receipt.mark_fraudulent();
            }

            let outcome = service.add_receipt(receipt).await.unwrap();
            let rejected = duplicate || fraudulent;

            prop_assert_eq!(outcome.is_admitted(), !rejected);
            prop_assert_eq!(ledger.recorded_payables().is_empty(), rejected);
            Ok(())
        })?;
    }

    /// Property: physical receipts pay only above the confidence threshold
    #[test]
    fn prop_physical_confidence_gate(confidence in 0.0f64..=1.0f64) {
        let rule: Arc<dyn RewardRule> = Arc::new(FnRule::new(
            "scan",
            [DomainEvent::Scan],
            |_, _| Some(Decimal::ONE),
        ));

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (service, capture, ledger) = build_service(vec![rule]);
            ledger.grant_consent(service.config().consent.license_id.clone());
            capture.queue_physical(Receipt::new("r1").with_confidence(confidence));

            let outcome = service.scan(ScanMode::Physical, None).await.unwrap();
            let threshold = service.config().scan.ocr_confidence_threshold;

            prop_assert_eq!(outcome.is_admitted(), confidence > threshold);
            prop_assert_eq!(ledger.recorded_payables().len(), usize::from(confidence > threshold));
            Ok(())
        })?;
    }

    /// Property: logout keeps only accounts differing in username and provider
    #[test]
    fn prop_logout_filter(
        cached in prop::collection::vec(account_strategy(), 1..10),
        target in account_strategy()
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (service, _, _) = build_service(vec![]);
            for account in &cached {
                service.login(account.clone()).await.unwrap();
            }

            service.logout(Some(&target)).await.unwrap();
            let remaining = service.cached_accounts();

            let expected = cached
                .iter()
                .filter(|a| a.username != target.username && a.provider != target.provider)
                .count();
            prop_assert_eq!(remaining.len(), expected);
            for account in &remaining {
                prop_assert_ne!(&account.username, &target.username);
                prop_assert_ne!(account.provider, target.provider);
            }
            Ok(())
        })?;
    }
}
