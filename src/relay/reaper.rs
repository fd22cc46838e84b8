//! Periodic sweep of sessions stuck in a terminal state.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::session::{SessionStore, TransferStatus};

pub struct Reaper<S> {
    store: Arc<SessionStore<S>>,
    interval: Duration,
}

impl<S: Send + 'static> Reaper<S> {
    pub fn new(store: Arc<SessionStore<S>>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Deletes `TimedOut` and `Done` sessions. `Waiting` and `InProgress`
    /// sessions are never touched.
    pub fn sweep_once(&self) -> usize {
        let removed = self.store.sweep(TransferStatus::is_terminal);
        if removed > 0 {
            tracing::info!(removed, remaining = self.store.len(), "reaped finished sessions");
        }
        removed
    }

    /// Sweeps every `interval` until `cancel` fires. The first sweep happens
    /// one full interval after start.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("reaper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep_once();
                }
            }
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
