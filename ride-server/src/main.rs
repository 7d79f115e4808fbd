use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use ride_server::config::ServerConfig;
use ride_server::coupons::MemoryCoupons;
use ride_server::directions::{CachedDirections, Directions, OsrmClient, UnavailableDirections};
use ride_server::dispatch::{Collaborators, DeadlineSupervisor, Dispatcher, SystemClock};
use ride_server::realtime::ConnectionRegistry;
use ride_server::store::{MemoryStore, SnapshotFile};
use ride_server::wallet::MemoryWallet;
use ride_server::web::{AppState, create_router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ride_server=info,tower_http=info")),
        )
        .init();

    let config = ServerConfig::load().expect("Failed to load configuration");
    let addr = config.bind_addr().expect("Invalid bind address");

    // Store, restored from the snapshot when one is configured
    let store = match &config.snapshot_path {
        Some(path) => {
            MemoryStore::open(SnapshotFile::new(path)).expect("Failed to open ride snapshot")
        }
        None => MemoryStore::new(),
    };

    // Directions, or the straight-line fallback when no router is configured
    let directions: Arc<dyn Directions> = match OsrmClient::new(config.directions.clone()) {
        Ok(client) => Arc::new(CachedDirections::new(
            Arc::new(client),
            &config.directions_cache,
        )),
        Err(e) => {
            tracing::warn!(error = %e, "Directions disabled, using straight-line estimates");
            Arc::new(UnavailableDirections)
        }
    };

    let registry = Arc::new(ConnectionRegistry::new());
    let deps = Collaborators {
        store: Arc::new(store),
        directions,
        events: registry.clone(),
        wallet: Arc::new(MemoryWallet::new()),
        coupons: Arc::new(MemoryCoupons::new(config.coupons.clone())),
        clock: Arc::new(SystemClock),
    };
    let dispatcher = Arc::new(Dispatcher::new(config.dispatch_settings(), deps));

    // Re-arm deadlines lost in a restart before taking traffic
    let supervisor = DeadlineSupervisor::new(dispatcher.clone());
    match supervisor.recover().await {
        Ok(report) => tracing::info!(
            searching = report.searching,
            armed = report.armed,
            "Recovered searching rides"
        ),
        Err(e) => tracing::error!(error = %e, "Deadline recovery failed"),
    }
    supervisor.spawn();

    let state = AppState::new(dispatcher, registry);
    let app = create_router(state).layer(TraceLayer::new_for_http());

    tracing::info!(%addr, "Ride dispatch server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
