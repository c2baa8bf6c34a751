//! Subscription lifecycle and billing engine.
//!
//! The state machine per (merchant, subscriber) pair:
//! `Inactive --create--> Active --modify--> Active --cancel--> Inactive`,
//! with `charge` as a self-loop on `Active` that advances the billing cursor
//! by exactly one interval.
//!
//! Every state-changing operation takes the caller's identity explicitly,
//! validates before any write, runs under one serialization gate, and either
//! applies its full effect or fails with a single [`BillingError`] kind and
//! no state change. Periodic charging has no scheduler here: any caller
//! (typically a relayer) invokes `charge` once the interval has elapsed, and
//! the engine supplies only the gating check.

use crate::{
    AccountId, Amount, AssetLedger, BillingError, BillingEvent, Clock, EngineConfig, EventLog,
    Governance, Result, SubscriptionInfo, SubscriptionRegistry, SubscriptionState,
    SubscriptionTerms, SystemClock,
};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

/// Outcome of a successful charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeReceipt {
    /// Gross amount moved out of the subscriber's balance.
    pub amount: Amount,
    /// Portion routed to the merchant.
    pub net: Amount,
    /// Commission routed to the administrator.
    pub fee: Amount,
    /// New billing cursor after this charge.
    pub cursor: i64,
}

pub struct BillingEngine {
    registry: Arc<dyn SubscriptionRegistry>,
    ledger: Arc<dyn AssetLedger>,
    clock: Arc<dyn Clock>,
    events: Arc<EventLog>,
    governance: RwLock<Governance>,
    engine_account: AccountId,
    allowance_floor: Amount,
    /// Serializes all state-changing operations: no two invocations ever
    /// interleave their reads and writes.
    gate: tokio::sync::Mutex<()>,
}

impl BillingEngine {
    pub fn new(
        config: EngineConfig,
        registry: Arc<dyn SubscriptionRegistry>,
        ledger: Arc<dyn AssetLedger>,
    ) -> Self {
        Self {
            registry,
            ledger,
            clock: Arc::new(SystemClock),
            events: Arc::new(EventLog::new()),
            governance: RwLock::new(Governance::new(
                config.administrator,
                config.min_interval_secs,
                config.max_amount,
            )),
            engine_account: config.engine_account,
            allowance_floor: config.allowance_floor,
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Substitute the time source. Tests use [`crate::ManualClock`].
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Notification stream for downstream audit consumers.
    pub fn events(&self) -> Arc<EventLog> {
        Arc::clone(&self.events)
    }

    fn governance(&self) -> std::sync::RwLockReadGuard<'_, Governance> {
        self.governance.read().unwrap_or_else(|e| e.into_inner())
    }

    fn governance_mut(&self) -> std::sync::RwLockWriteGuard<'_, Governance> {
        self.governance.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Policy checks shared by create and modify, in fixed order: amount
    /// shape, then interval floor, then amount ceiling.
    fn validate_terms(&self, terms: &SubscriptionTerms) -> Result<()> {
        terms.validate()?;
        let governance = self.governance();
        if terms.interval_secs < governance.min_interval_secs {
            return Err(BillingError::IntervalTooLow);
        }
        if terms.amount > governance.max_amount {
            return Err(BillingError::AmountTooHigh);
        }
        Ok(())
    }

    /// Register a recurring charge from `merchant` against the calling
    /// `subscriber`. The subscriber must already hold a spending allowance
    /// for the engine on the ledger of at least the configured floor.
    pub async fn create_subscription(
        &self,
        subscriber: &AccountId,
        merchant: &AccountId,
        terms: SubscriptionTerms,
    ) -> Result<SubscriptionInfo> {
        let _gate = self.gate.lock().await;

        let allowance = self
            .ledger
            .allowance(subscriber, &self.engine_account, &terms.asset)
            .await
            .map_err(BillingError::Ledger)?;
        if allowance < self.allowance_floor {
            return Err(BillingError::AllowanceInsufficient);
        }

        let existing = self
            .registry
            .get(merchant, subscriber)
            .await
            .map_err(BillingError::Storage)?;
        if existing.is_active() {
            return Err(BillingError::AlreadySubscribed);
        }

        self.validate_terms(&terms)?;

        let now = self.clock.now();
        let state = SubscriptionState::Active {
            terms: terms.clone(),
            last_charge_cursor: now,
        };
        self.registry
            .set(merchant, subscriber, state.clone())
            .await
            .map_err(BillingError::Storage)?;

        info!(%merchant, %subscriber, amount = %terms.amount, interval = terms.interval_secs, "subscription created");
        self.events.append(BillingEvent::Created {
            merchant: merchant.clone(),
            subscriber: subscriber.clone(),
            amount: terms.amount,
            interval_secs: terms.interval_secs,
            asset: terms.asset,
            at: now,
        });
        Ok(state.info())
    }

    /// Overwrite the terms of an existing subscription. The billing cursor
    /// resets to now: changing terms forfeits any partially elapsed period.
    pub async fn modify_subscription(
        &self,
        subscriber: &AccountId,
        merchant: &AccountId,
        terms: SubscriptionTerms,
    ) -> Result<SubscriptionInfo> {
        let _gate = self.gate.lock().await;

        let existing = self
            .registry
            .get(merchant, subscriber)
            .await
            .map_err(BillingError::Storage)?;
        if !existing.is_active() {
            return Err(BillingError::SubscriptionNotFound);
        }

        self.validate_terms(&terms)?;

        let now = self.clock.now();
        let state = SubscriptionState::Active {
            terms: terms.clone(),
            last_charge_cursor: now,
        };
        self.registry
            .set(merchant, subscriber, state.clone())
            .await
            .map_err(BillingError::Storage)?;

        info!(%merchant, %subscriber, amount = %terms.amount, interval = terms.interval_secs, "subscription modified");
        self.events.append(BillingEvent::Modified {
            merchant: merchant.clone(),
            subscriber: subscriber.clone(),
            amount: terms.amount,
            interval_secs: terms.interval_secs,
            asset: terms.asset,
            at: now,
        });
        Ok(state.info())
    }

    /// Cancel the caller's own subscription to `merchant`.
    pub async fn cancel_by_subscriber(
        &self,
        subscriber: &AccountId,
        merchant: &AccountId,
    ) -> Result<()> {
        self.cancel_pair(merchant, subscriber, subscriber.clone())
            .await
    }

    /// Cancel `subscriber`'s subscription on behalf of the calling merchant.
    pub async fn cancel_by_merchant(
        &self,
        merchant: &AccountId,
        subscriber: &AccountId,
    ) -> Result<()> {
        self.cancel_pair(merchant, subscriber, merchant.clone()).await
    }

    /// Idempotent: cancelling an inactive pair succeeds with no effect
    /// beyond the notification.
    async fn cancel_pair(
        &self,
        merchant: &AccountId,
        subscriber: &AccountId,
        cancelled_by: AccountId,
    ) -> Result<()> {
        let _gate = self.gate.lock().await;

        self.registry
            .clear(merchant, subscriber)
            .await
            .map_err(BillingError::Storage)?;

        info!(%merchant, %subscriber, by = %cancelled_by, "subscription cancelled");
        self.events.append(BillingEvent::Cancelled {
            merchant: merchant.clone(),
            subscriber: subscriber.clone(),
            cancelled_by,
            at: self.clock.now(),
        });
        Ok(())
    }

    /// Execute one due charge for the pair. Invocable by anyone; the gating
    /// check on the billing cursor is what prevents double charges, not the
    /// caller's identity.
    ///
    /// The two ledger transfers and the cursor advancement form one atomic
    /// unit: if either transfer is refused the cursor does not move, and a
    /// completed first leg is compensated by a best-effort reversal.
    pub async fn charge(
        &self,
        merchant: &AccountId,
        subscriber: &AccountId,
    ) -> Result<ChargeReceipt> {
        let _gate = self.gate.lock().await;

        let state = self
            .registry
            .get(merchant, subscriber)
            .await
            .map_err(BillingError::Storage)?;
        let SubscriptionState::Active {
            terms,
            last_charge_cursor,
        } = state
        else {
            return Err(BillingError::SubscriptionNotFound);
        };

        // The interval is u64 and may exceed i64; compare in i128 so an
        // oversized interval can never read as already elapsed.
        let now = self.clock.now();
        let elapsed = i128::from(now.saturating_sub(last_charge_cursor));
        if elapsed <= i128::from(terms.interval_secs) {
            debug!(%merchant, %subscriber, cursor = last_charge_cursor, "charge attempted before period elapsed");
            return Err(BillingError::PeriodNotElapsed);
        }

        // Two-phase: confirm the allowance still covers the gross amount
        // before moving anything, so a partial transfer cannot happen merely
        // because the allowance ran down between the two legs.
        let allowance = self
            .ledger
            .allowance(subscriber, &self.engine_account, &terms.asset)
            .await
            .map_err(BillingError::Ledger)?;
        if allowance < terms.amount {
            return Err(BillingError::TransferFailed);
        }

        let (net, fee) = terms.amount.commission_split();
        let administrator = self.governance().administrator.clone();

        let net_ok = self
            .ledger
            .transfer_from(subscriber, merchant, &terms.asset, net)
            .await
            .map_err(BillingError::Ledger)?;
        if !net_ok {
            return Err(BillingError::TransferFailed);
        }

        let fee_ok = self
            .ledger
            .transfer_from(subscriber, &administrator, &terms.asset, fee)
            .await
            .map_err(BillingError::Ledger)?;
        if !fee_ok {
            warn!(%merchant, %subscriber, "commission transfer refused, reversing net leg");
            match self
                .ledger
                .transfer_from(merchant, subscriber, &terms.asset, net)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    error!(%merchant, %subscriber, amount = %net, "compensating reversal refused by ledger")
                }
                Err(e) => {
                    error!(%merchant, %subscriber, amount = %net, "compensating reversal failed: {e}")
                }
            }
            return Err(BillingError::TransferFailed);
        }

        // Advance by exactly one interval, not to now: late execution must
        // not drift the cadence grid.
        let cursor = last_charge_cursor
            .saturating_add(i64::try_from(terms.interval_secs).unwrap_or(i64::MAX));
        let gross = terms.amount;
        self.registry
            .set(
                merchant,
                subscriber,
                SubscriptionState::Active {
                    terms,
                    last_charge_cursor: cursor,
                },
            )
            .await
            .map_err(BillingError::Storage)?;

        info!(%merchant, %subscriber, amount = %gross, cursor, "charge executed");
        self.events.append(BillingEvent::Charged {
            merchant: merchant.clone(),
            subscriber: subscriber.clone(),
            amount: gross,
            at: now,
        });
        Ok(ChargeReceipt {
            amount: gross,
            net,
            fee,
            cursor,
        })
    }

    /// Replace the administrator. Caller must be the current administrator.
    pub async fn change_administrator(
        &self,
        caller: &AccountId,
        new_admin: AccountId,
    ) -> Result<()> {
        let _gate = self.gate.lock().await;

        let previous = self
            .governance_mut()
            .change_administrator(caller, new_admin.clone())?;

        info!(%previous, current = %new_admin, "administrator changed");
        self.events.append(BillingEvent::AdministratorChanged {
            previous,
            current: new_admin,
            at: self.clock.now(),
        });
        Ok(())
    }

    /// Loosen both governance bounds. Caller must be the administrator, and
    /// the new ceiling/floor must strictly loosen the current ones.
    pub async fn raise_limits(
        &self,
        caller: &AccountId,
        new_max_amount: Amount,
        new_min_interval_secs: u64,
    ) -> Result<()> {
        let _gate = self.gate.lock().await;

        self.governance_mut()
            .raise_limits(caller, new_max_amount, new_min_interval_secs)?;

        info!(max_amount = %new_max_amount, min_interval = new_min_interval_secs, "limits raised");
        self.events.append(BillingEvent::LimitsRaised {
            max_amount: new_max_amount,
            min_interval_secs: new_min_interval_secs,
            at: self.clock.now(),
        });
        Ok(())
    }

    /// Current administrator identity.
    pub fn read_administrator(&self) -> AccountId {
        self.governance().administrator.clone()
    }

    /// Stored terms and cursor for the pair; the zeroed record for inactive
    /// or never-created pairs.
    pub async fn read_subscription(
        &self,
        merchant: &AccountId,
        subscriber: &AccountId,
    ) -> Result<SubscriptionInfo> {
        let state = self
            .registry
            .get(merchant, subscriber)
            .await
            .map_err(BillingError::Storage)?;
        Ok(state.info())
    }
}
