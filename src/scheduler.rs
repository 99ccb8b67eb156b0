//! Refresh scheduling
//!
//! Three triggers start a cycle: the periodic timer, a manual refresh and an
//! address change. The engine's in-flight flag admits at most one cycle at a
//! time. When a cycle's price fetch fails, a single price-only retry is armed
//! after the degraded delay; the next cycle to start cancels it.
//!
//! Timers hold a weak reference to the scheduler, so dropping the
//! [`RefreshScheduler`] tears every timer down. Cycles themselves are never
//! cancelled once started.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::engine::{CycleReport, SyncEngine};
use crate::error::SyncError;
use crate::storage::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Refreshing,
    /// Last price fetch failed; a price-only retry is pending
    DegradedWaiting,
}

struct DegradedRetry {
    handle: JoinHandle<()>,
    /// Set once the delay elapsed and the retry fetch started
    fired: Arc<AtomicBool>,
}

struct SchedulerInner {
    engine: Arc<SyncEngine>,
    interval: Duration,
    degraded_delay: Duration,
    periodic: Mutex<Option<JoinHandle<()>>>,
    degraded: Mutex<Option<DegradedRetry>>,
    /// Address changed after the running cycle read it
    rerun_pending: AtomicBool,
}

pub struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
}

impl RefreshScheduler {
    /// Scheduler using the engine's configured interval and degraded delay
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        let interval = engine.config().refresh_interval;
        let degraded_delay = engine.config().degraded_retry_delay;
        Self::with_timings(engine, interval, degraded_delay)
    }

    pub fn with_timings(engine: Arc<SyncEngine>, interval: Duration, degraded_delay: Duration) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                engine,
                interval,
                degraded_delay,
                periodic: Mutex::new(None),
                degraded: Mutex::new(None),
                rerun_pending: AtomicBool::new(false),
            }),
        }
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.inner.engine
    }

    /// Arm the periodic timer per current settings and run the first cycle
    pub async fn start(&self) -> Option<CycleReport> {
        log::info!(
            "🔄 Starting refresh scheduler (interval: {:?}, degraded retry: {:?})",
            self.inner.interval,
            self.inner.degraded_delay
        );
        self.inner.sync_periodic();
        self.inner.run_cycle().await
    }

    /// Cancel every pending timer
    pub fn stop(&self) {
        self.inner.cancel_periodic();
        self.inner.cancel_degraded();
        log::info!("Refresh scheduler stopped");
    }

    /// Manual refresh; `None` when a cycle is already in flight
    pub async fn refresh_now(&self) -> Option<CycleReport> {
        self.inner.run_cycle().await
    }

    /// Apply settings, re-arm the periodic timer, refresh on address change
    ///
    /// The timer is always torn down and recreated rather than left running,
    /// so a new interval or re-enabled auto-refresh takes effect immediately.
    /// An address change during an in-flight cycle is picked up by a second
    /// cycle once that one finishes; the report is then `None`.
    pub async fn apply_settings(&self, settings: Settings) -> Result<Option<CycleReport>, SyncError> {
        let change = self.inner.engine.apply_settings(settings)?;
        self.inner.sync_periodic();

        if change.address_changed && !self.inner.engine.address().is_empty() {
            self.inner.rerun_pending.store(true, Ordering::SeqCst);
            Ok(self.inner.run_cycle().await)
        } else {
            Ok(None)
        }
    }

    /// Make a wallet-book entry the active address
    pub async fn select_wallet(&self, id: &str) -> Result<Option<CycleReport>, SyncError> {
        let settings = self.inner.engine.settings_for_wallet(id)?;
        self.apply_settings(settings).await
    }

    pub fn state(&self) -> SchedulerState {
        if self.inner.engine.is_refreshing() {
            SchedulerState::Refreshing
        } else if self.is_degraded_pending() {
            SchedulerState::DegradedWaiting
        } else {
            SchedulerState::Idle
        }
    }

    pub fn is_periodic_armed(&self) -> bool {
        lock(&self.inner.periodic)
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    pub fn is_degraded_pending(&self) -> bool {
        lock(&self.inner.degraded).as_ref().map_or(false, |retry| {
            !retry.fired.load(Ordering::Acquire) && !retry.handle.is_finished()
        })
    }
}

impl SchedulerInner {
    async fn run_cycle(self: &Arc<Self>) -> Option<CycleReport> {
        let mut last = None;
        loop {
            let Some(guard) = self.engine.try_begin_refresh() else {
                if last.is_none() {
                    log::debug!("Refresh already in flight, ignoring trigger");
                }
                return last;
            };
            // This cycle reads the current address
            self.rerun_pending.store(false, Ordering::SeqCst);
            self.cancel_degraded();

            let report = self.engine.refresh_cycle(guard).await;
            if report.price_failed() {
                self.arm_degraded();
            }
            last = Some(report);

            if !self.rerun_pending.load(Ordering::SeqCst) {
                return last;
            }
            log::info!("Address changed during refresh, refreshing again");
        }
    }

    fn sync_periodic(self: &Arc<Self>) {
        self.cancel_periodic();
        let settings = self.engine.settings();
        if settings.auto_refresh && !settings.wallet_address.is_empty() {
            self.arm_periodic();
        }
    }

    fn arm_periodic(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if inner.engine.is_refreshing() {
                    log::debug!("Skipping periodic refresh, cycle in flight");
                    continue;
                }
                // The cycle outlives a timer teardown
                tokio::spawn(async move {
                    inner.run_cycle().await;
                });
            }
        });

        log::debug!("Periodic refresh armed every {:?}", period);
        if let Some(previous) = lock(&self.periodic).replace(handle) {
            previous.abort();
        }
    }

    fn cancel_periodic(&self) {
        if let Some(handle) = lock(&self.periodic).take() {
            handle.abort();
        }
    }

    fn arm_degraded(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let delay = self.degraded_delay;
        let fired = Arc::new(AtomicBool::new(false));
        let fired_flag = fired.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fired_flag.store(true, Ordering::Release);
            let Some(inner) = weak.upgrade() else {
                return;
            };

            log::info!("Retrying price fetch after degraded delay");
            match inner.engine.refresh_price().await {
                Ok(_) => log::info!("✅ Price data recovered"),
                Err(e) => {
                    log::warn!("Degraded price retry failed: {}", e);
                    if inner.is_current_degraded(&fired_flag) {
                        inner.arm_degraded();
                    }
                }
            }
        });

        log::warn!("Price unavailable, retrying in {:?}", delay);
        let previous = lock(&self.degraded).replace(DegradedRetry { handle, fired });
        if let Some(previous) = previous {
            if !previous.fired.load(Ordering::Acquire) {
                previous.handle.abort();
            }
        }
    }

    /// Drop a pending retry; one already fetching is left to finish
    fn cancel_degraded(&self) {
        if let Some(retry) = lock(&self.degraded).take() {
            if !retry.fired.load(Ordering::Acquire) {
                retry.handle.abort();
                log::debug!("Pending degraded price retry cancelled");
            }
        }
    }

    fn is_current_degraded(&self, fired: &Arc<AtomicBool>) -> bool {
        lock(&self.degraded)
            .as_ref()
            .map_or(false, |retry| Arc::ptr_eq(&retry.fired, fired))
    }
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        self.cancel_periodic();
        self.cancel_degraded();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
