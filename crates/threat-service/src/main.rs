//! Threat modeling orchestrator binary: HTTP surface plus the background
//! scheduler and worker tasks.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::trace::TraceLayer;
use tracing::info;

use threat_service::analysis::routes::analyses_router;
use threat_service::analysis::scheduler::{scheduler_loop, worker_loop};
use threat_service::analysis::{AnalyzerClient, ImageStorage, ProcessingService};
use threat_service::notification::routes::notifications_router;
use threat_service::{db, OrchestratorState, Settings};
use threat_shared::{connect_pool, cors_layer, health_router, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env();
    init_tracing(&settings.log_level);
    info!("Starting {} v{}", settings.app_name, settings.app_version);

    let pool = connect_pool(&settings.database_url).await?;
    db::init_schema(&pool).await?;
    info!("Database schema ready");

    let storage = ImageStorage::new(settings.storage_root.clone());
    let client = AnalyzerClient::new(
        &settings.analyzer_url,
        Duration::from_secs(settings.analyzer_timeout_secs),
    );
    let processing = Arc::new(ProcessingService::new(
        pool.clone(),
        storage.clone(),
        client,
    ));

    // Background work: one scan per interval, at most one claim per tick,
    // jobs handed to the worker over the channel.
    let (tx, rx) = tokio::sync::mpsc::channel(16);
    tokio::spawn(scheduler_loop(
        pool.clone(),
        tx,
        Duration::from_secs(settings.scan_interval_secs),
    ));
    tokio::spawn(worker_loop(rx, processing));

    let state = OrchestratorState {
        pool: pool.clone(),
        storage,
        settings: Arc::new(settings.clone()),
    };

    let api = analyses_router(state.clone()).merge(notifications_router(state));
    let app = axum::Router::new()
        .nest("/api/v1", api)
        .merge(health_router(
            settings.app_name.clone(),
            settings.app_version.clone(),
            Some(pool),
        ))
        .layer(cors_layer(&settings.cors_origins))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Orchestrator listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
