//! Periodic liveness probe.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Owns the heartbeat interval task and the consecutive-miss counter.
///
/// The task only emits ticks into the controller's internal channel; the
/// controller sends the actual `ping` so it can be tracked like any other
/// pending operation.
#[derive(Debug, Default)]
pub struct HeartbeatMonitor {
    handle: Option<JoinHandle<()>>,
    misses: u32,
}

impl HeartbeatMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)start ticking every `period`. The first tick comes after one full period.
    pub fn start<T>(&mut self, period: Duration, tx: mpsc::UnboundedSender<T>, tick: T)
    where
        T: Clone + Send + 'static,
    {
        self.stop();
        self.handle = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(tick.clone()).is_err() {
                    break;
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.misses = 0;
    }

    pub fn record_success(&mut self) {
        self.misses = 0;
    }

    /// Count a missed round trip and return the new total.
    pub fn record_miss(&mut self) -> u32 {
        self.misses += 1;
        self.misses
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
