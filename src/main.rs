//! Killer Rounds Back binary entrypoint wiring REST, SSE and the storage backend.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use killer_rounds_back::{
    config::{AppConfig, StorageBackend},
    dao::game_store::memory::MemoryGameStore,
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    install_storage(&app_state).await?;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the configured backend. Database backends are connected by the
/// storage supervisor in the background; requests get 503 until then.
async fn install_storage(state: &SharedState) -> anyhow::Result<()> {
    match state.config().storage {
        StorageBackend::Memory => {
            info!("using in-memory storage; games are lost on restart");
            state.set_game_store(Arc::new(MemoryGameStore::new())).await;
        }
        #[cfg(feature = "mongo-store")]
        StorageBackend::Mongo => {
            tokio::spawn(killer_rounds_back::services::storage_supervisor::run(
                state.clone(),
                mongo::connect,
            ));
        }
        #[cfg(feature = "couch-store")]
        StorageBackend::Couch => {
            tokio::spawn(killer_rounds_back::services::storage_supervisor::run(
                state.clone(),
                couch::connect,
            ));
        }
        #[allow(unreachable_patterns)]
        other => anyhow::bail!("storage backend {other:?} is not compiled into this binary"),
    }
    Ok(())
}

#[cfg(feature = "mongo-store")]
mod mongo {
    use std::sync::Arc;

    use killer_rounds_back::dao::{
        game_store::{
            GameStore,
            mongodb::{MongoConfig, MongoGameStore},
        },
        storage::StorageError,
    };

    pub async fn connect() -> Result<Arc<dyn GameStore>, StorageError> {
        let config = MongoConfig::from_env().await?;
        let store = MongoGameStore::connect(config).await?;
        Ok(Arc::new(store))
    }
}

#[cfg(feature = "couch-store")]
mod couch {
    use std::sync::Arc;

    use killer_rounds_back::dao::{
        game_store::{
            GameStore,
            couchdb::{CouchConfig, CouchGameStore},
        },
        storage::StorageError,
    };

    pub async fn connect() -> Result<Arc<dyn GameStore>, StorageError> {
        let config = CouchConfig::from_env()?;
        let store = CouchGameStore::connect(config).await?;
        Ok(Arc::new(store))
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
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
                warn!(error = %err, "cannot listen for SIGTERM; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
