//! Quiz rooms backend entrypoint wiring the REST API, the room store and its supervisors.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiz_rooms_back::{
    app,
    config::AppConfig,
    dao::{
        room_store::{MemoryRoomStore, RoomStore},
        storage::StorageError,
    },
    services::storage_supervisor,
    state::{AppState, SharedState},
};

/// Backends selectable through `ROOM_STORE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreKind {
    Memory,
    Mongo,
    Couch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    let kind = store_kind()?;
    info!(store = ?kind, "selected room store");
    spawn_store_supervisor(app_state.clone(), kind)?;
    tokio::spawn(storage_supervisor::run_eviction(app_state.clone()));

    let app = app(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Read `ROOM_STORE` (`memory` when unset).
fn store_kind() -> anyhow::Result<StoreKind> {
    let raw = env::var("ROOM_STORE").unwrap_or_else(|_| "memory".into());
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "memory" => Ok(StoreKind::Memory),
        "mongo" | "mongodb" => Ok(StoreKind::Mongo),
        "couch" | "couchdb" => Ok(StoreKind::Couch),
        other => bail!("unknown ROOM_STORE `{other}` (expected memory, mongo or couch)"),
    }
}

/// Start the background task that connects the selected store and supervises it.
fn spawn_store_supervisor(state: SharedState, kind: StoreKind) -> anyhow::Result<()> {
    match kind {
        StoreKind::Memory => {
            let store: Arc<dyn RoomStore> = Arc::new(MemoryRoomStore::new());
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(store) }
            }));
        }
        #[cfg(feature = "mongo-store")]
        StoreKind::Mongo => {
            use quiz_rooms_back::dao::room_store::mongodb::{MongoConfig, MongoRoomStore};

            tokio::spawn(storage_supervisor::run(state, || async {
                let config = MongoConfig::from_env().await?;
                let store = MongoRoomStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn RoomStore>)
            }));
        }
        #[cfg(feature = "couch-store")]
        StoreKind::Couch => {
            use quiz_rooms_back::dao::room_store::couchdb::{CouchConfig, CouchRoomStore};

            tokio::spawn(storage_supervisor::run(state, || async {
                let config = CouchConfig::from_env()?;
                let store = CouchRoomStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn RoomStore>)
            }));
        }
        #[allow(unreachable_patterns)]
        other => bail!("room store {other:?} is not compiled in"),
    }
    Ok(())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
