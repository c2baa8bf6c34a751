//! End-to-end lifecycle scenarios against the in-memory ledger and registry.

use chargekit::{
    AccountId, Amount, AssetId, AssetLedger, BillingEngine, BillingError, BillingEvent, Clock,
    EngineConfig, ManualClock, MemoryLedger, MemoryRegistry, SubscriptionTerms,
};
use std::sync::Arc;
use tokio_test::assert_ok;

const T0: i64 = 1_700_000_000;
const DAY: u64 = 86_400;

struct World {
    engine: BillingEngine,
    ledger: Arc<MemoryLedger>,
    clock: Arc<ManualClock>,
    admin: AccountId,
    merchant: AccountId,
    subscriber: AccountId,
    asset: AssetId,
}

fn units(n: u64) -> Amount {
    Amount::from_base_units(n)
}

fn world() -> World {
    let admin = AccountId::new("admin");
    let merchant = AccountId::new("acme");
    let subscriber = AccountId::new("sam");
    let asset = AssetId::new("TOK");
    let engine_account = AccountId::new("engine");

    let ledger = Arc::new(MemoryLedger::new(engine_account.clone()));
    ledger.credit(&subscriber, &asset, units(10_000));
    ledger.approve(&subscriber, &asset, units(10_000));

    let clock = Arc::new(ManualClock::new(T0));
    let engine = BillingEngine::new(
        EngineConfig::new(admin.clone(), engine_account)
            .with_limits(units(100_000_000_000), DAY),
        Arc::new(MemoryRegistry::new()),
        Arc::clone(&ledger) as Arc<dyn AssetLedger>,
    )
    .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);

    World {
        engine,
        ledger,
        clock,
        admin,
        merchant,
        subscriber,
        asset,
    }
}

/// The reference scenario: create at t0, charge once after the interval,
/// reject the second charge in the same period, cancel, observe the zeroed
/// record.
#[tokio::test]
async fn reference_billing_scenario() {
    let w = world();
    let terms = SubscriptionTerms::new(units(200), DAY, w.asset.clone());

    let info = w
        .engine
        .create_subscription(&w.subscriber, &w.merchant, terms)
        .await
        .unwrap();
    assert_eq!(info.last_charge_cursor, T0);

    w.clock.set(T0 + DAY as i64 + 1);
    let receipt = w.engine.charge(&w.merchant, &w.subscriber).await.unwrap();
    assert_eq!(receipt.net, units(198));
    assert_eq!(receipt.fee, units(2));
    assert_eq!(receipt.cursor, T0 + DAY as i64);
    assert_eq!(w.ledger.balance_of(&w.merchant, &w.asset), units(198));
    assert_eq!(w.ledger.balance_of(&w.admin, &w.asset), units(2));

    w.clock.set(T0 + DAY as i64 + 2);
    let err = w.engine.charge(&w.merchant, &w.subscriber).await.unwrap_err();
    assert!(matches!(err, BillingError::PeriodNotElapsed));

    tokio_test::assert_ok!(w.engine.cancel_by_subscriber(&w.subscriber, &w.merchant).await);
    let read = w
        .engine
        .read_subscription(&w.merchant, &w.subscriber)
        .await
        .unwrap();
    assert!(read.amount.is_zero());
}

/// Late charges stay on the cadence grid: after n successful charges the
/// cursor sits at exactly t0 + n * interval regardless of execution times.
#[tokio::test]
async fn late_charges_do_not_drift_the_cadence_grid() {
    let w = world();
    w.engine
        .create_subscription(
            &w.subscriber,
            &w.merchant,
            SubscriptionTerms::new(units(200), DAY, w.asset.clone()),
        )
        .await
        .unwrap();

    // Execute three charges, each several hours late.
    for n in 1..=3i64 {
        w.clock.set(T0 + n * DAY as i64 + 7_200 * n);
        let receipt = w.engine.charge(&w.merchant, &w.subscriber).await.unwrap();
        assert_eq!(receipt.cursor, T0 + n * DAY as i64);
    }

    assert_eq!(w.ledger.balance_of(&w.merchant, &w.asset), units(3 * 198));
}

/// A relayer that fell far behind can catch up one period per call, never
/// more than one charge per elapsed period.
#[tokio::test]
async fn catching_up_charges_one_period_per_call() {
    let w = world();
    w.engine
        .create_subscription(
            &w.subscriber,
            &w.merchant,
            SubscriptionTerms::new(units(200), DAY, w.asset.clone()),
        )
        .await
        .unwrap();

    // Three full periods elapse before anyone calls charge.
    w.clock.set(T0 + 3 * DAY as i64 + 1);
    for expected in 1..=3i64 {
        let receipt = w.engine.charge(&w.merchant, &w.subscriber).await.unwrap();
        assert_eq!(receipt.cursor, T0 + expected * DAY as i64);
    }
    // The fourth call is now ahead of the grid.
    let err = w.engine.charge(&w.merchant, &w.subscriber).await.unwrap_err();
    assert!(matches!(err, BillingError::PeriodNotElapsed));
}

#[tokio::test]
async fn modification_restarts_the_billing_period() {
    let w = world();
    w.engine
        .create_subscription(
            &w.subscriber,
            &w.merchant,
            SubscriptionTerms::new(units(200), DAY, w.asset.clone()),
        )
        .await
        .unwrap();

    // Most of a period elapses, then the terms change.
    w.clock.set(T0 + DAY as i64 - 100);
    w.engine
        .modify_subscription(
            &w.subscriber,
            &w.merchant,
            SubscriptionTerms::new(units(300), DAY, w.asset.clone()),
        )
        .await
        .unwrap();

    // The partially elapsed period is forfeit: a charge shortly after the
    // old period boundary is rejected.
    w.clock.set(T0 + DAY as i64 + 1);
    let err = w.engine.charge(&w.merchant, &w.subscriber).await.unwrap_err();
    assert!(matches!(err, BillingError::PeriodNotElapsed));

    // A full interval after modification, the new amount bills.
    w.clock.set(T0 + 2 * DAY as i64);
    let receipt = w.engine.charge(&w.merchant, &w.subscriber).await.unwrap();
    assert_eq!(receipt.amount, units(300));
    assert_eq!(receipt.net, units(297));
    assert_eq!(receipt.fee, units(3));
}

#[tokio::test]
async fn merchants_are_scoped_independently_per_subscriber() {
    let w = world();
    let other = AccountId::new("globex");

    w.engine
        .create_subscription(
            &w.subscriber,
            &w.merchant,
            SubscriptionTerms::new(units(200), DAY, w.asset.clone()),
        )
        .await
        .unwrap();
    w.engine
        .create_subscription(
            &w.subscriber,
            &other,
            SubscriptionTerms::new(units(500), DAY, w.asset.clone()),
        )
        .await
        .unwrap();

    tokio_test::assert_ok!(w.engine.cancel_by_merchant(&w.merchant, &w.subscriber).await);

    let gone = w
        .engine
        .read_subscription(&w.merchant, &w.subscriber)
        .await
        .unwrap();
    let kept = w.engine.read_subscription(&other, &w.subscriber).await.unwrap();
    assert!(gone.amount.is_zero());
    assert_eq!(kept.amount, units(500));
}

#[tokio::test]
async fn event_log_records_one_notification_per_mutation() {
    let w = world();
    w.engine
        .create_subscription(
            &w.subscriber,
            &w.merchant,
            SubscriptionTerms::new(units(200), DAY, w.asset.clone()),
        )
        .await
        .unwrap();
    w.clock.set(T0 + DAY as i64 + 1);
    w.engine.charge(&w.merchant, &w.subscriber).await.unwrap();
    w.engine
        .cancel_by_subscriber(&w.subscriber, &w.merchant)
        .await
        .unwrap();

    let events = w.engine.events().snapshot();
    assert_eq!(events.len(), 3);
    assert!(matches!(
        &events[0],
        BillingEvent::Created { amount, .. } if *amount == units(200)
    ));
    assert!(matches!(
        &events[1],
        BillingEvent::Charged { amount, .. } if *amount == units(200)
    ));
    assert!(matches!(
        &events[2],
        BillingEvent::Cancelled { cancelled_by, .. } if *cancelled_by == w.subscriber
    ));
}

#[tokio::test]
async fn failed_operations_emit_no_events() {
    let w = world();
    let _ = w
        .engine
        .create_subscription(
            &w.subscriber,
            &w.merchant,
            SubscriptionTerms::new(units(123), DAY, w.asset.clone()),
        )
        .await;
    let _ = w.engine.charge(&w.merchant, &w.subscriber).await;
    let _ = w
        .engine
        .raise_limits(&w.subscriber, units(1), 1)
        .await;
    assert!(w.engine.events().is_empty());
}
