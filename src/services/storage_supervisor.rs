use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{storage::StorageError, study_store::StudyStore},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep the durable store connected, toggling degraded mode while it is not.
///
/// Connects with exponential backoff, installs the store into the shared
/// state, and polls its health. A failed health check gets a bounded number
/// of reconnect attempts before the store is dropped and the outer connect
/// loop starts over.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn StudyStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                continue;
            }
        };

        state.install_study_store(store.clone()).await;
        info!("storage connection established; leaving degraded mode");
        delay = INITIAL_DELAY;

        supervise(&state, store.as_ref()).await;

        state.clear_study_store().await;
        warn!("storage connection lost; entering degraded mode");
        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll health until the store is lost for good.
async fn supervise(state: &SharedState, store: &dyn StudyStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                state.update_degraded(false).await;
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                state.update_degraded(true).await;
                if !reconnect_with_backoff(store).await {
                    warn!("exhausted storage reconnect attempts");
                    return;
                }
                info!("storage reconnection succeeded; leaving degraded mode");
                state.update_degraded(false).await;
            }
        }
    }
}

async fn reconnect_with_backoff(store: &dyn StudyStore) -> bool {
    let mut delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => return true,
            Err(err) => {
                warn!(attempt, error = %err, "storage reconnect attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}
