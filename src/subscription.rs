//! Subscription terms and lifecycle state.
//!
//! Lifecycle is an explicit tagged state per (merchant, subscriber) pair:
//! `Active` carries the terms and the billing cursor, `Inactive` covers both
//! "never created" and "cancelled". Re-creation after cancellation is legal;
//! modifying an `Inactive` pair is not.

use crate::{AccountId, Amount, AssetId, BillingError, Result};
use serde::{Deserialize, Serialize};

/// The terms of a recurring charge: how much, how often, in what asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionTerms {
    pub amount: Amount,
    pub interval_secs: u64,
    pub asset: AssetId,
}

impl SubscriptionTerms {
    pub fn new(amount: Amount, interval_secs: u64, asset: AssetId) -> Self {
        Self {
            amount,
            interval_secs,
            asset,
        }
    }

    /// Shape validation only. Policy limits (interval floor, amount ceiling)
    /// are enforced by the engine against governance state.
    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_subscription_grade() {
            return Err(BillingError::InvalidAmount);
        }
        Ok(())
    }
}

/// Lifecycle state stored per (merchant, subscriber) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum SubscriptionState {
    Active {
        terms: SubscriptionTerms,
        /// Start of the last successfully billed period. Advances by exactly
        /// one interval per charge, preserving a fixed cadence grid even when
        /// charges execute late.
        last_charge_cursor: i64,
    },
    Inactive,
}

impl SubscriptionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionState::Active { .. })
    }

    /// Read view of this state. Inactive pairs read as the zeroed record
    /// rather than a not-found signal.
    pub fn info(&self) -> SubscriptionInfo {
        match self {
            SubscriptionState::Active {
                terms,
                last_charge_cursor,
            } => SubscriptionInfo {
                amount: terms.amount,
                interval_secs: terms.interval_secs,
                asset: terms.asset.clone(),
                last_charge_cursor: *last_charge_cursor,
            },
            SubscriptionState::Inactive => SubscriptionInfo::default(),
        }
    }
}

/// What `read_subscription` returns: the stored terms and cursor for active
/// pairs, all-zero for inactive or never-created ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub amount: Amount,
    pub interval_secs: u64,
    pub asset: AssetId,
    pub last_charge_cursor: i64,
}

/// Registry key for a subscription record.
pub type PairKey = (AccountId, AccountId);
