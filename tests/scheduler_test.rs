//! Refresh scheduler tests on a paused tokio clock
//!
//! Sleeping in a paused test advances virtual time through every pending
//! timer in order, so the periodic and degraded timers fire deterministically.

mod common;

use btc_wallet_sync::{RefreshScheduler, SchedulerState, Settings};
use common::{price, TestEnvironment, ADDRESS, OTHER_ADDRESS};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const INTERVAL: Duration = Duration::from_secs(60);
const DEGRADED: Duration = Duration::from_secs(30);

fn scheduler(env: &TestEnvironment) -> Arc<RefreshScheduler> {
    Arc::new(RefreshScheduler::with_timings(env.engine.clone(), INTERVAL, DEGRADED))
}

fn price_down(env: &TestEnvironment) {
    env.primary.script.set_default(Err(503));
    env.fallback.script.set_default(Err(503));
}

// ============================================================================
// Degraded retry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_price_exhaustion_arms_single_retry_after_delay() {
    let env = TestEnvironment::new();
    let scheduler = scheduler(&env);
    price_down(&env);

    let report = scheduler.refresh_now().await.unwrap();
    assert!(report.price_failed());
    assert_eq!(scheduler.state(), SchedulerState::DegradedWaiting);
    assert_eq!(env.primary.script.calls(), 1);

    sleep(Duration::from_secs(29)).await;
    assert_eq!(env.primary.script.calls(), 1, "retry fired early");

    env.primary.script.set_default(Ok(price(61_000.0, 56_000.0)));
    sleep(Duration::from_secs(2)).await;

    assert_eq!(env.primary.script.calls(), 2);
    assert_eq!(env.engine.price(), Some(price(61_000.0, 56_000.0)));
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    assert!(env.engine.last_error().is_none());

    // Nothing else pending
    sleep(Duration::from_secs(300)).await;
    assert_eq!(env.primary.script.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_manual_refresh_cancels_pending_retry() {
    let env = TestEnvironment::new();
    let scheduler = scheduler(&env);
    price_down(&env);

    scheduler.refresh_now().await.unwrap();
    assert!(scheduler.is_degraded_pending());

    env.primary.script.set_default(Ok(price(50_000.0, 45_000.0)));
    sleep(Duration::from_secs(10)).await;
    let report = scheduler.refresh_now().await.unwrap();

    assert!(!report.price_failed());
    assert!(!scheduler.is_degraded_pending());
    assert_eq!(scheduler.state(), SchedulerState::Idle);

    sleep(Duration::from_secs(120)).await;
    assert_eq!(env.primary.script.calls(), 2, "cancelled retry still ran");
}

#[tokio::test(start_paused = true)]
async fn test_failed_retry_rearms_one_timer() {
    let env = TestEnvironment::new();
    let scheduler = scheduler(&env);
    price_down(&env);

    scheduler.refresh_now().await.unwrap();

    sleep(Duration::from_secs(31)).await;
    assert_eq!(env.primary.script.calls(), 2);
    assert_eq!(scheduler.state(), SchedulerState::DegradedWaiting);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(env.primary.script.calls(), 3);
    assert_eq!(env.fallback.script.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_is_price_only() {
    let env = TestEnvironment::new();
    env.engine
        .apply_settings(Settings {
            wallet_address: ADDRESS.to_string(),
            auto_refresh: false,
            ..Settings::default()
        })
        .unwrap();
    let scheduler = scheduler(&env);
    price_down(&env);

    scheduler.refresh_now().await.unwrap();
    assert_eq!(env.ledger.script.calls(), 1);

    env.primary.script.set_default(Ok(price(50_000.0, 45_000.0)));
    sleep(Duration::from_secs(31)).await;

    assert!(env.engine.price().is_some());
    assert_eq!(env.ledger.script.calls(), 1);
}

// ============================================================================
// In-flight guard
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_trigger_during_inflight_cycle_is_ignored() {
    let env = TestEnvironment::new();
    env.engine
        .apply_settings(Settings {
            wallet_address: ADDRESS.to_string(),
            ..Settings::default()
        })
        .unwrap();
    env.ledger.script.set_latency(Duration::from_secs(5));
    let scheduler = scheduler(&env);

    let background = scheduler.clone();
    let first = tokio::spawn(async move { background.refresh_now().await });
    tokio::task::yield_now().await;

    assert!(env.engine.is_refreshing());
    assert_eq!(scheduler.state(), SchedulerState::Refreshing);
    assert!(scheduler.refresh_now().await.is_none());

    let report = first.await.unwrap();
    assert!(report.is_some());
    assert_eq!(env.primary.script.calls(), 1);
    assert_eq!(env.ledger.script.calls(), 1);
    assert!(!env.engine.is_refreshing());
}

#[tokio::test(start_paused = true)]
async fn test_flag_cleared_after_failed_cycle() {
    let env = TestEnvironment::new();
    env.engine
        .apply_settings(Settings {
            wallet_address: ADDRESS.to_string(),
            ..Settings::default()
        })
        .unwrap();
    env.ledger.script.set_default(Err(500));
    price_down(&env);
    let scheduler = scheduler(&env);

    scheduler.refresh_now().await.unwrap();

    assert!(!env.engine.is_refreshing());
    assert!(scheduler.refresh_now().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_address_change_during_inflight_cycle_refreshes_new_address() {
    let env = TestEnvironment::new();
    env.engine
        .apply_settings(Settings {
            wallet_address: ADDRESS.to_string(),
            auto_refresh: false,
            ..Settings::default()
        })
        .unwrap();
    env.ledger.script.set_latency(Duration::from_secs(5));
    let scheduler = scheduler(&env);

    let background = scheduler.clone();
    let first = tokio::spawn(async move { background.refresh_now().await });
    tokio::task::yield_now().await;
    assert!(env.engine.is_refreshing());

    let report = scheduler
        .apply_settings(Settings {
            wallet_address: OTHER_ADDRESS.to_string(),
            auto_refresh: false,
            ..Settings::default()
        })
        .await
        .unwrap();
    assert!(report.is_none());

    let last = first.await.unwrap().expect("cycle ran");
    assert!(!env.engine.is_refreshing());
    assert!(last.price.is_some());

    let wallet = env.engine.wallet().expect("new address fetched");
    assert_eq!(wallet.address, OTHER_ADDRESS);
    assert_eq!(env.ledger.script.calls(), 2);
    assert_eq!(env.primary.script.calls(), 2);

    // No further cycles once the rerun is done
    sleep(INTERVAL * 3).await;
    assert_eq!(env.ledger.script.calls(), 2);
}

// ============================================================================
// Periodic timer
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_periodic_ticks_follow_auto_refresh_setting() {
    let env = TestEnvironment::new();
    let scheduler = scheduler(&env);

    // No address yet: initial cycle refreshes the price only, no timer
    scheduler.start().await.unwrap();
    assert!(!scheduler.is_periodic_armed());

    // Address change triggers an immediate cycle and arms the timer
    let report = scheduler
        .apply_settings(Settings {
            wallet_address: ADDRESS.to_string(),
            ..Settings::default()
        })
        .await
        .unwrap();
    assert!(report.is_some());
    assert!(scheduler.is_periodic_armed());
    assert_eq!(env.primary.script.calls(), 2);
    assert_eq!(env.ledger.script.calls(), 1);

    sleep(INTERVAL + Duration::from_secs(1)).await;
    assert_eq!(env.primary.script.calls(), 3);

    sleep(INTERVAL).await;
    assert_eq!(env.primary.script.calls(), 4);

    // Disabling auto-refresh tears the timer down without a new cycle
    let report = scheduler
        .apply_settings(Settings {
            wallet_address: ADDRESS.to_string(),
            auto_refresh: false,
            ..Settings::default()
        })
        .await
        .unwrap();
    assert!(report.is_none());
    assert!(!scheduler.is_periodic_armed());

    sleep(INTERVAL * 3).await;
    assert_eq!(env.primary.script.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_reenabled_timer_starts_a_full_interval_later() {
    let env = TestEnvironment::new();
    let scheduler = scheduler(&env);
    scheduler
        .apply_settings(Settings {
            wallet_address: ADDRESS.to_string(),
            auto_refresh: false,
            ..Settings::default()
        })
        .await
        .unwrap();
    assert_eq!(env.primary.script.calls(), 1);

    sleep(Duration::from_secs(45)).await;
    scheduler
        .apply_settings(Settings {
            wallet_address: ADDRESS.to_string(),
            auto_refresh: true,
            ..Settings::default()
        })
        .await
        .unwrap();

    sleep(Duration::from_secs(59)).await;
    assert_eq!(env.primary.script.calls(), 1);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(env.primary.script.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_scheduler_stops_timers() {
    let env = TestEnvironment::new();
    let scheduler = scheduler(&env);
    scheduler
        .apply_settings(Settings {
            wallet_address: ADDRESS.to_string(),
            ..Settings::default()
        })
        .await
        .unwrap();
    price_down(&env);
    scheduler.refresh_now().await.unwrap();
    assert!(scheduler.is_periodic_armed());
    assert!(scheduler.is_degraded_pending());
    let calls = env.primary.script.calls();

    drop(scheduler);
    sleep(INTERVAL * 5).await;

    assert_eq!(env.primary.script.calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_everything() {
    let env = TestEnvironment::new();
    let scheduler = scheduler(&env);
    scheduler
        .apply_settings(Settings {
            wallet_address: ADDRESS.to_string(),
            ..Settings::default()
        })
        .await
        .unwrap();

    scheduler.stop();
    assert!(!scheduler.is_periodic_armed());

    sleep(INTERVAL * 2).await;
    assert_eq!(env.primary.script.calls(), 1);
}
