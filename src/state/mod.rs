pub mod room;
pub mod scoring;
pub mod state_machine;

use std::{future::Future, sync::Arc};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::timeout;
use tracing::warn;

use crate::{config::AppConfig, dao::room_store::RoomStore, error::ServiceError};

pub use self::room::{Answer, LeaveOutcome, Player, Question, Room, RoomError};
pub use self::state_machine::{InvalidTransition, RoomEvent, RoomStatus};

pub type SharedState = Arc<AppState>;

/// Central application state: the installed room store, the degraded flag and
/// the per-room transaction gates.
pub struct AppState {
    room_store: RwLock<Option<Arc<dyn RoomStore>>>,
    degraded: watch::Sender<bool>,
    room_gates: DashMap<String, Arc<Mutex<()>>>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            room_store: RwLock::new(None),
            degraded: degraded_tx,
            room_gates: DashMap::new(),
            config,
        })
    }

    /// Construct a state with `store` already installed.
    pub async fn with_store(config: AppConfig, store: Arc<dyn RoomStore>) -> SharedState {
        let state = Self::new(config);
        state.install_room_store(store).await;
        state
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current room store, if one is installed.
    pub async fn room_store(&self) -> Option<Arc<dyn RoomStore>> {
        let guard = self.room_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current room store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_room_store(&self) -> Result<Arc<dyn RoomStore>, ServiceError> {
        self.room_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new room store implementation and leave degraded mode.
    pub async fn install_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.room_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current room store and enter degraded mode.
    pub async fn clear_room_store(&self) {
        {
            let mut guard = self.room_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.room_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Run `work` while holding the gate of room `code`, so that two
    /// operations on the same room never interleave inside this process.
    ///
    /// The configured transaction timeout covers waiting for the gate as well
    /// as the work. Past it the transaction is dropped and reported as
    /// [`ServiceError::Timeout`].
    pub async fn run_room_transaction<F, Fut, T>(
        &self,
        code: &str,
        work: F,
    ) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.room_gate(code);
        let gated = async {
            let _guard = gate.lock().await;
            work().await
        };

        let outcome = match self.config.transaction_timeout() {
            Some(limit) => match timeout(limit, gated).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        room = %code,
                        timeout_ms = limit.as_millis() as u64,
                        "room transaction timed out"
                    );
                    Err(ServiceError::Timeout)
                }
            },
            None => gated.await,
        };

        drop(gate);
        self.release_gate(code);
        outcome
    }

    fn room_gate(&self, code: &str) -> Arc<Mutex<()>> {
        self.room_gates
            .entry(code.to_owned())
            .or_default()
            .value()
            .clone()
    }

    /// Drop the gate entry once nobody else holds or waits on it.
    fn release_gate(&self, code: &str) {
        self.room_gates
            .remove_if(code, |_, gate| Arc::strong_count(gate) == 1);
    }

    #[cfg(test)]
    fn gate_count(&self) -> usize {
        self.room_gates.len()
    }
}
