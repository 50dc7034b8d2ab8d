use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, info, warn};

use crate::{
    dao::{room_store::RoomStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the room store and keep the shared state in degraded mode while it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RoomStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_room_store(store.clone()).await;
                info!("room store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                watch_health(&state, &store).await;
                warn!("exhausted room store reconnect attempts; reconnecting from scratch");

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "room store connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the store health, reconnecting on failure. Returns once reconnecting gave up.
async fn watch_health(state: &SharedState, store: &Arc<dyn RoomStore>) {
    loop {
        if store.health_check().await.is_ok() {
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        let mut reconnect_delay = INITIAL_DELAY;
        let mut reconnected = false;

        for attempt in 0..MAX_RECONNECT_ATTEMPTS {
            match store.try_reconnect().await {
                Ok(()) => {
                    info!(attempt, "room store reconnected after health check failure");
                    reconnected = true;
                    break;
                }
                Err(err) => {
                    if attempt == 0 {
                        warn!(
                            attempt, error = %err,
                            "room store reconnect failed; entering degraded mode"
                        );
                        state.clear_room_store().await;
                    } else {
                        warn!(attempt, error = %err, "room store reconnect attempt failed");
                    }
                    sleep(reconnect_delay).await;
                    reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                }
            }
        }

        if !reconnected {
            state.clear_room_store().await;
            return;
        }

        if state.is_degraded().await {
            info!("room store healthy again; leaving degraded mode");
            state.install_room_store(Arc::clone(store)).await;
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// Periodically remove expired rooms from whichever store is installed.
pub async fn run_eviction(state: SharedState) {
    let mut ticker = interval(state.config().eviction_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        sweep_expired(&state).await;
    }
}

/// Run one eviction pass, returning how many rooms were removed.
pub async fn sweep_expired(state: &SharedState) -> usize {
    let Some(store) = state.room_store().await else {
        debug!("skipping eviction sweep in degraded mode");
        return 0;
    };

    match store.evict_expired().await {
        Ok(0) => 0,
        Ok(evicted) => {
            info!(evicted, "evicted expired rooms");
            evicted
        }
        Err(err) => {
            warn!(error = %err, "expired room sweep failed");
            0
        }
    }
}
