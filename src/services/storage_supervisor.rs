use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{game_store::GameStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

fn next_delay(current: Duration) -> Duration {
    (current * 2).min(MAX_DELAY)
}

/// Connect to the storage backend and keep the shared state in degraded mode
/// whenever it is unreachable. Never returns.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_game_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                supervise(&state, store.as_ref()).await;

                warn!("exhausted storage reconnect attempts; reconnecting from scratch");
                state.clear_game_store().await;
            }
            Err(err) => warn!(error = %err, "storage connection attempt failed"),
        }

        sleep(delay).await;
        delay = next_delay(delay);
    }
}

/// Poll the store until it fails in a way an in-place reconnect cannot fix.
async fn supervise(state: &SharedState, store: &dyn GameStore) {
    loop {
        if store.health_check().await.is_err() {
            if !reconnect(state, store).await {
                return;
            }
            state.update_degraded(false).await;
        } else if state.is_degraded().await {
            info!("storage healthy again; leaving degraded mode");
            state.update_degraded(false).await;
        }

        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect(state: &SharedState, store: &dyn GameStore) -> bool {
    let mut delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) if attempt == 0 => {
                warn!(
                    attempt, error = %err,
                    "storage reconnect first attempt failed; entering degraded mode"
                );
                state.update_degraded(true).await;
            }
            Err(err) => warn!(attempt, error = %err, "storage reconnect attempt failed"),
        }

        sleep(delay).await;
        delay = next_delay(delay);
    }

    false
}
