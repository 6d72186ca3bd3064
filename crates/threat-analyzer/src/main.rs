//! Threat analyzer service binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::info;

use threat_analyzer::routes::{api_router, AppState};
use threat_analyzer::{Settings, ThreatModelService};
use threat_shared::{cors_layer, health_router, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env();
    init_tracing(&settings.log_level);
    info!("Starting {} v{}", settings.app_name, settings.app_version);

    let service = Arc::new(ThreatModelService::new(&settings));
    let state = AppState {
        settings: Arc::new(settings.clone()),
        service,
    };

    let app = api_router(state)
        .merge(health_router(
            settings.app_name.clone(),
            settings.app_version.clone(),
            None,
        ))
        .layer(cors_layer(&settings.cors_origins))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Analyzer listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
