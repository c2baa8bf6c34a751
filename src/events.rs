//! Notification stream for downstream observers.
//!
//! Every state-changing operation appends exactly one event. Consumers treat
//! the log as append-only audit data; the engine never reads it back.

use crate::{AccountId, Amount, AssetId};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// One notification per state-changing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BillingEvent {
    Created {
        merchant: AccountId,
        subscriber: AccountId,
        amount: Amount,
        interval_secs: u64,
        asset: AssetId,
        at: i64,
    },
    Modified {
        merchant: AccountId,
        subscriber: AccountId,
        amount: Amount,
        interval_secs: u64,
        asset: AssetId,
        at: i64,
    },
    Cancelled {
        merchant: AccountId,
        subscriber: AccountId,
        cancelled_by: AccountId,
        at: i64,
    },
    Charged {
        merchant: AccountId,
        subscriber: AccountId,
        amount: Amount,
        at: i64,
    },
    LimitsRaised {
        max_amount: Amount,
        min_interval_secs: u64,
        at: i64,
    },
    AdministratorChanged {
        previous: AccountId,
        current: AccountId,
        at: i64,
    },
}

/// Append-only in-process event log. Thread-safe with RwLock.
#[derive(Default)]
pub struct EventLog {
    entries: RwLock<Vec<BillingEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, event: BillingEvent) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.push(event);
    }

    /// Copy of the log so far, in emission order.
    pub fn snapshot(&self) -> Vec<BillingEvent> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.clone()
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cancelled(at: i64) -> BillingEvent {
        BillingEvent::Cancelled {
            merchant: AccountId::new("m"),
            subscriber: AccountId::new("s"),
            cancelled_by: AccountId::new("s"),
            at,
        }
    }

    #[test]
    fn log_preserves_emission_order() {
        let log = EventLog::new();
        assert!(log.is_empty());

        log.append(cancelled(1));
        log.append(cancelled(2));
        log.append(cancelled(3));

        let events = log.snapshot();
        assert_eq!(log.len(), 3);
        assert_eq!(events, vec![cancelled(1), cancelled(2), cancelled(3)]);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_string(&BillingEvent::LimitsRaised {
            max_amount: Amount::from_base_units(200),
            min_interval_secs: 3600,
            at: 99,
        })
        .unwrap();
        assert!(json.contains("\"type\":\"LimitsRaised\""));
        let back: BillingEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, BillingEvent::LimitsRaised { .. }));
    }
}
