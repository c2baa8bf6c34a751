//! # Chargekit
//!
//! Recurring-billing authorization engine operating against an external asset
//! ledger it does not itself manage. A merchant registers recurring charges
//! against a subscriber, subject to a spending allowance the subscriber has
//! granted the engine on the ledger beforehand.
//!
//! ## Guarantees
//!
//! - Every operation runs as one atomic, serialized step: no interleaving
//!   between concurrent callers, no partial mutation on failure
//! - At most one charge per elapsed billing period per subscription
//! - Exact commission split: `net + fee == amount` for any amount that is a
//!   multiple of 100 base units
//! - Governance limits only ever loosen (higher amount ceiling, lower
//!   interval floor)
//!
//! ## Architecture
//!
//! The engine validates against [`governance::Governance`], reads and writes
//! the [`registry::SubscriptionRegistry`], and calls out to the
//! [`ledger::AssetLedger`] before durably advancing the billing cursor. Each
//! state-changing operation appends one [`events::BillingEvent`] to an
//! append-only log for downstream audit consumers.

pub mod account;
pub mod amount;
pub mod clock;
pub mod config;
pub mod engine;
pub mod events;
pub mod governance;
pub mod ledger;
pub mod registry;
pub mod subscription;

pub use account::{AccountId, AssetId};
pub use amount::Amount;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use engine::{BillingEngine, ChargeReceipt};
pub use events::{BillingEvent, EventLog};
pub use governance::Governance;
pub use ledger::{AssetLedger, MemoryLedger};
pub use registry::{FileRegistry, MemoryRegistry, SubscriptionRegistry};
pub use subscription::{PairKey, SubscriptionInfo, SubscriptionState, SubscriptionTerms};

pub type Result<T> = std::result::Result<T, BillingError>;

/// Error kinds surfaced by the engine. All are fail-atomic: a failed call
/// leaves the registry and governance state exactly as before the call.
#[derive(thiserror::Error, Debug)]
pub enum BillingError {
    #[error("spending allowance below the required minimum")]
    AllowanceInsufficient,
    #[error("an active subscription already exists for this pair")]
    AlreadySubscribed,
    #[error("amount must be a nonzero multiple of 100 base units")]
    InvalidAmount,
    #[error("interval is below the governance minimum")]
    IntervalTooLow,
    #[error("amount exceeds the governance maximum")]
    AmountTooHigh,
    #[error("no active subscription for this pair")]
    SubscriptionNotFound,
    #[error("the current billing period has not yet elapsed")]
    PeriodNotElapsed,
    #[error("asset ledger refused the transfer")]
    TransferFailed,
    #[error("caller is not authorized for this operation")]
    NotAuthorized,
    #[error("new limits must loosen both bounds")]
    LimitsNotLoosened,
    #[error("registry error: {0}")]
    Storage(#[source] anyhow::Error),
    #[error("ledger error: {0}")]
    Ledger(#[source] anyhow::Error),
}
