//! Governed global policy: the administrator identity and the two limit
//! bounds every subscription is validated against at write time.
//!
//! Limits only ever loosen: the amount ceiling may rise, the interval floor
//! may fall. Existing subscriptions are never revalidated after a change.

use crate::{AccountId, Amount, BillingError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Governance {
    pub administrator: AccountId,
    pub min_interval_secs: u64,
    pub max_amount: Amount,
}

impl Governance {
    pub fn new(administrator: AccountId, min_interval_secs: u64, max_amount: Amount) -> Self {
        Self {
            administrator,
            min_interval_secs,
            max_amount,
        }
    }

    fn require_administrator(&self, caller: &AccountId) -> Result<()> {
        if caller != &self.administrator {
            return Err(BillingError::NotAuthorized);
        }
        Ok(())
    }

    /// Replace the administrator. Returns the previous identity for the
    /// change notification.
    pub fn change_administrator(
        &mut self,
        caller: &AccountId,
        new_admin: AccountId,
    ) -> Result<AccountId> {
        self.require_administrator(caller)?;
        let previous = std::mem::replace(&mut self.administrator, new_admin);
        Ok(previous)
    }

    /// Update both bounds atomically. Both must strictly loosen: a higher
    /// amount ceiling and a lower interval floor.
    pub fn raise_limits(
        &mut self,
        caller: &AccountId,
        new_max_amount: Amount,
        new_min_interval_secs: u64,
    ) -> Result<()> {
        self.require_administrator(caller)?;
        if new_max_amount <= self.max_amount || new_min_interval_secs >= self.min_interval_secs {
            return Err(BillingError::LimitsNotLoosened);
        }
        self.max_amount = new_max_amount;
        self.min_interval_secs = new_min_interval_secs;
        Ok(())
    }
}
