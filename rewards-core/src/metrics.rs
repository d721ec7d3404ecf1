//! Metrics collection for observability
//!
//! Each service owns its own Prometheus registry, so several services (or
//! tests) can live in one process.
//!
//! # Metrics
//!
//! - `rewards_payables_issued_total{event}` - Payables created per event
//! - `rewards_amount_issued_total` - Sum of issued amounts
//! - `rewards_receipts_admitted_total` - Receipts that reached the decision loop
//! - `rewards_receipts_rejected_total{reason}` - Receipts dropped by admission
//! - `rewards_rule_evaluations_total` - Rule evaluations performed

use crate::types::{DomainEvent, RejectionReason};
use prometheus::{Counter, IntCounter, IntCounterVec, Opts, Registry};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Payables issued, by event
    pub payables_issued: IntCounterVec,

    /// Sum of issued amounts
    pub amount_issued: Counter,

    /// Receipts admitted
    pub receipts_admitted: IntCounter,

    /// Receipts rejected, by reason
    pub receipts_rejected: IntCounterVec,

    /// Rule evaluations
    pub rule_evaluations: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let payables_issued = IntCounterVec::new(
            Opts::new(
                "rewards_payables_issued_total",
                "Payables created, by triggering event",
            ),
            &["event"],
        )?;
        registry.register(Box::new(payables_issued.clone()))?;

        let amount_issued = Counter::new(
            "rewards_amount_issued_total",
            "Sum of issued reward amounts",
        )?;
        registry.register(Box::new(amount_issued.clone()))?;

        let receipts_admitted = IntCounter::new(
            "rewards_receipts_admitted_total",
            "Receipts that reached the decision loop",
        )?;
        registry.register(Box::new(receipts_admitted.clone()))?;

        let receipts_rejected = IntCounterVec::new(
            Opts::new(
                "rewards_receipts_rejected_total",
                "Receipts dropped before reward issuance, by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(receipts_rejected.clone()))?;

        let rule_evaluations = IntCounter::new(
            "rewards_rule_evaluations_total",
            "Reward rule evaluations performed",
        )?;
        registry.register(Box::new(rule_evaluations.clone()))?;

        Ok(Self {
            payables_issued,
            amount_issued,
            receipts_admitted,
            receipts_rejected,
            rule_evaluations,
            registry,
        })
    }

    /// Record a created payable
    pub fn record_payable(&self, event: DomainEvent, amount: Decimal) {
        self.payables_issued
            .with_label_values(&[event.as_str()])
            .inc();
        self.amount_issued.inc_by(amount.to_f64().unwrap_or(0.0));
    }

    /// Record an admitted receipt
    pub fn record_admitted(&self) {
        self.receipts_admitted.inc();
    }

    /// Record a rejected receipt
    pub fn record_rejected(&self, reason: &RejectionReason) {
        self.receipts_rejected
            .with_label_values(&[reason.label()])
            .inc();
    }

    /// Record a rule evaluation
    pub fn record_rule_evaluation(&self) {
        self.rule_evaluations.inc();
    }

    /// Payables issued for one event
    pub fn payables_for(&self, event: DomainEvent) -> u64 {
        self.payables_issued
            .with_label_values(&[event.as_str()])
            .get()
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("receipts_admitted", &self.receipts_admitted.get())
            .field("rule_evaluations", &self.rule_evaluations.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.receipts_admitted.get(), 0);
        assert_eq!(metrics.payables_for(DomainEvent::Link), 0);
    }

    #[test]
    fn test_two_collectors_coexist() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();
        first.record_admitted();
        assert_eq!(first.receipts_admitted.get(), 1);
        assert_eq!(second.receipts_admitted.get(), 0);
    }

    #[test]
    fn test_record_payable() {
        let metrics = Metrics::new().unwrap();
        metrics.record_payable(DomainEvent::Scan, Decimal::new(250, 2));
        metrics.record_payable(DomainEvent::Scan, Decimal::new(100, 2));

        assert_eq!(metrics.payables_for(DomainEvent::Scan), 2);
        assert!((metrics.amount_issued.get() - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_rejected() {
        let metrics = Metrics::new().unwrap();
        metrics.record_rejected(&RejectionReason::Fraudulent);
        assert_eq!(
            metrics
                .receipts_rejected
                .with_label_values(&["fraudulent"])
                .get(),
            1
        );
    }
}
