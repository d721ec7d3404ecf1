//! Rewards demo
//!
//! Runs a scripted session against the in-memory capture and ledger
//! clients: restore a persisted retailer account, link an inbox, scan
//! paper receipts, scrape the inbox, unlink it, and print what was paid.
//!
//! Usage: `rewards-demo [config.toml]`

use anyhow::Context;
use reward_rules::{RuleConfig, RuleSet};
use rewards_core::{
    clients::{MemoryCaptureClient, MemoryLedgerClient},
    Account, Config, DomainEvent, Provider, RawAccount, Receipt, RewardService, ScanMode,
    ScanOutcome, Secret,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

/// Demo configuration file
#[derive(Debug, Deserialize)]
struct DemoConfig {
    #[serde(default)]
    service: Config,

    #[serde(default)]
    rules: Vec<RuleConfig>,
}

impl DemoConfig {
    fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path))?;
                toml::from_str::<DemoConfig>(&content)
                    .with_context(|| format!("parsing {}", path))?
            }
            None => DemoConfig {
                service: Config::from_env()?,
                rules: Vec::new(),
            },
        };

        config.service.validate()?;
        if config.rules.is_empty() {
            config.rules = default_rules();
        }
        Ok(config)
    }
}

fn default_rules() -> Vec<RuleConfig> {
    vec![
        RuleConfig::Fixed {
            name: Some("link-bonus".to_string()),
            event: DomainEvent::Link,
            amount: Decimal::new(100, 2),
        },
        RuleConfig::Fixed {
            name: Some("scan-bonus".to_string()),
            event: DomainEvent::Scan,
            amount: Decimal::new(200, 2),
        },
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let path = std::env::args().nth(1);
    let config = DemoConfig::load(path.as_deref())?;
    tracing::info!(
        service = %config.service.service_name,
        rules = config.rules.len(),
        "Starting rewards demo"
    );

    let rules = RuleSet::new(config.rules).into_rules()?;
    let capture = Arc::new(MemoryCaptureClient::new());
    let ledger = Arc::new(MemoryLedgerClient::new(config.service.ledger.currency.clone()));
    ledger.grant_consent(config.service.consent.license_id.clone());

    let service = RewardService::new(config.service, capture.clone(), ledger.clone(), rules)?;

    service.on_account("console", |account, change| {
        println!("  account {:?}: {}", change, account);
        Ok(())
    });
    service.on_receipt("console", |receipt| {
        println!(
            "  receipt {} admitted ({})",
            receipt.id,
            receipt.merchant.as_deref().unwrap_or("unknown merchant")
        );
        Ok(())
    });

    println!("\n== Restore persisted accounts");
    capture.persist_account(RawAccount {
        username: " shopper-42 ".to_string(),
        password: Some(Secret::new("hunter2")),
        provider_key: "Kroger".to_string(),
        verified: true,
    });
    capture.queue_online(
        Receipt::new("kroger-order-1001")
            .with_merchant("Kroger")
            .with_total(Decimal::new(8734, 2)),
    );
    service.accounts().await?;
    let failed = service.wait_background().await;
    if failed > 0 {
        tracing::warn!(failed, "Some background scans failed");
    }

    println!("\n== Link inbox");
    let inbox = service
        .login(Account::new("Demo.User@Gmail.com", Provider::Gmail).with_password("app-password"))
        .await?;

    println!("\n== Scan paper receipts");
    capture.queue_physical(
        Receipt::new("paper-1")
            .with_merchant("Whole Foods")
            .with_total(Decimal::new(4210, 2))
            .with_confidence(0.97),
    );
    capture.queue_physical(Receipt::new("paper-2").with_confidence(0.42));
    capture.queue_physical(
        Receipt::new("paper-3")
            .with_confidence(0.99)
            .mark_duplicate(),
    );
    for _ in 0..3 {
        report(service.scan(ScanMode::Physical, None).await?);
    }

    println!("\n== Scrape inbox");
    capture.queue_scraped(
        Receipt::new("email-1")
            .with_merchant("Target")
            .with_total(Decimal::new(1999, 2)),
    );
    capture.queue_scraped(Receipt::new("email-2").mark_fraudulent());
    service.scrape(&inbox).await?;
    service.wait_background().await;

    println!("\n== Unlink inbox");
    service.logout(Some(&inbox)).await?;

    println!("\n== Rewards");
    for record in service.history() {
        println!(
            "  {:<6} {:<14} {:>8} {}",
            record.event().as_str(),
            record.rule(),
            record.amount().to_string(),
            record.receipt_id().unwrap_or("-")
        );
    }
    println!("  total rewarded: {}", service.total_rewarded());
    println!("  ledger payables: {}", service.payables().await?.len());

    let mut buffer = Vec::new();
    let encoder = prometheus::TextEncoder::new();
    prometheus::Encoder::encode(&encoder, &service.metrics().registry().gather(), &mut buffer)?;
    println!("\n== Metrics\n{}", String::from_utf8(buffer)?);

    service.shutdown().await;
    Ok(())
}

fn report(outcome: ScanOutcome) {
    match outcome {
        ScanOutcome::Admitted(_) => {}
        ScanOutcome::Rejected { receipt, reason } => {
            println!("  receipt {} rejected: {}", receipt.id, reason);
        }
    }
}
