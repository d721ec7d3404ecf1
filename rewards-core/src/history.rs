//! In-process reward history
//!
//! Append-only: records are pushed by the decision loop and only ever read
//! back as snapshots.

use crate::types::{DomainEvent, HistoryEvent};
use parking_lot::RwLock;
use rust_decimal::Decimal;

/// Append-only log of reward issuances
#[derive(Debug, Default)]
pub struct HistoryLog {
    records: RwLock<Vec<HistoryEvent>>,
}

impl HistoryLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record
    pub fn append(&self, record: HistoryEvent) {
        self.records.write().push(record);
    }

    /// All records in issuance order
    pub fn snapshot(&self) -> Vec<HistoryEvent> {
        self.records.read().clone()
    }

    /// Records for one event
    pub fn for_event(&self, event: DomainEvent) -> Vec<HistoryEvent> {
        self.records
            .read()
            .iter()
            .filter(|record| record.event() == event)
            .cloned()
            .collect()
    }

    /// Sum of all rewarded amounts
    pub fn total(&self) -> Decimal {
        self.records.read().iter().map(HistoryEvent::amount).sum()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// No records yet
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_total() {
        let log = HistoryLog::new();
        log.append(HistoryEvent::new(
            Decimal::new(100, 2),
            DomainEvent::Link,
            None,
            "link",
            None,
        ));
        log.append(HistoryEvent::new(
            Decimal::new(250, 2),
            DomainEvent::Scan,
            None,
            "scan",
            Some("r1".to_string()),
        ));

        assert_eq!(log.len(), 2);
        assert_eq!(log.total(), Decimal::new(350, 2));
        assert_eq!(log.for_event(DomainEvent::Scan).len(), 1);
        assert_eq!(log.snapshot()[0].rule(), "link");
    }

    #[test]
    fn test_empty_log() {
        let log = HistoryLog::new();
        assert!(log.is_empty());
        assert_eq!(log.total(), Decimal::ZERO);
    }
}
