use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

use crate::services::timer_service;
use crate::state::SharedState;

/// Handle used to stop the background tick loop.
pub struct TickerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TickerHandle {
    /// Stop the loop and wait for the task to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Spawn the 1 Hz clock driving the timer.
///
/// Ticks go through the same service entry point as user events, so they
/// are serialized behind the timer lock; a tick landing after a reset
/// observes an idle machine and does nothing. Missed ticks are skipped
/// rather than burst-delivered, so a stalled host never fast-forwards the
/// countdown.
pub fn spawn(state: SharedState) -> TickerHandle {
    let (shutdown, mut signal) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut clock = interval(Duration::from_secs(1));
        clock.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = clock.tick() => {
                    if let Err(err) = timer_service::tick(&state).await {
                        debug!(error = %err, "tick rejected");
                    }
                }
                changed = signal.changed() => {
                    if changed.is_err() || *signal.borrow() {
                        break;
                    }
                }
            }
        }
    });
    TickerHandle { shutdown, task }
}
