//! Background timers: periodic license refresh and server heartbeat.
//!
//! Each timer is a tokio task holding a `Weak` reference to its target and a
//! [`CancellationToken`]. A timer ends when it is stopped, when the scheduler
//! is dropped, or when the target is gone. The first tick fires one full
//! period after start.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Boxed future returned by timer jobs.
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Work the timers perform.
pub trait LicenseTask: Send + Sync + 'static {
    /// Re-evaluate the license, bypassing any cache.
    fn scheduled_refresh(self: Arc<Self>) -> TaskFuture;

    /// Tell the license server this device is still alive.
    fn scheduled_heartbeat(self: Arc<Self>) -> TaskFuture;
}

#[derive(Debug)]
pub struct Scheduler {
    refresh_period: Duration,
    heartbeat_period: Duration,
    refresh: Mutex<Option<CancellationToken>>,
    heartbeat: Mutex<Option<CancellationToken>>,
}

fn lock(slot: &Mutex<Option<CancellationToken>>) -> MutexGuard<'_, Option<CancellationToken>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

impl Scheduler {
    pub fn new(refresh_period: Duration, heartbeat_period: Duration) -> Self {
        Self {
            refresh_period,
            heartbeat_period,
            refresh: Mutex::new(None),
            heartbeat: Mutex::new(None),
        }
    }

    /// Start the refresh timer unless it is already running.
    pub fn start_refresh<T: LicenseTask>(&self, target: Weak<T>) {
        Self::ensure(&self.refresh, "refresh", self.refresh_period, target, T::scheduled_refresh);
    }

    /// Start the heartbeat timer unless it is already running.
    pub fn start_heartbeat<T: LicenseTask>(&self, target: Weak<T>) {
        Self::ensure(
            &self.heartbeat,
            "heartbeat",
            self.heartbeat_period,
            target,
            T::scheduled_heartbeat,
        );
    }

    pub fn stop_refresh(&self) {
        Self::cancel(&self.refresh, "refresh");
    }

    pub fn stop_heartbeat(&self) {
        Self::cancel(&self.heartbeat, "heartbeat");
    }

    /// Stop both timers.
    pub fn stop(&self) {
        self.stop_refresh();
        self.stop_heartbeat();
    }

    pub fn is_refresh_running(&self) -> bool {
        Self::running(&self.refresh)
    }

    pub fn is_heartbeat_running(&self) -> bool {
        Self::running(&self.heartbeat)
    }

    fn running(slot: &Mutex<Option<CancellationToken>>) -> bool {
        lock(slot).as_ref().is_some_and(|t| !t.is_cancelled())
    }

    fn cancel(slot: &Mutex<Option<CancellationToken>>, name: &'static str) {
        if let Some(token) = lock(slot).take() {
            token.cancel();
            debug!(timer = name, "timer stopped");
        }
    }

    fn ensure<T: LicenseTask>(
        slot: &Mutex<Option<CancellationToken>>,
        name: &'static str,
        period: Duration,
        target: Weak<T>,
        job: fn(Arc<T>) -> TaskFuture,
    ) {
        let mut guard = lock(slot);
        if guard.as_ref().is_some_and(|t| !t.is_cancelled()) {
            return;
        }

        let token = CancellationToken::new();
        *guard = Some(token.clone());
        drop(guard);

        debug!(timer = name, period_secs = period.as_secs(), "timer started");
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let Some(target) = target.upgrade() else {
                    debug!(timer = name, "target dropped, timer exiting");
                    token.cancel();
                    break;
                };

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = job(target) => {}
                }
            }
        });
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
