// Horizon portal HTTP server using Axum
// Serves the admin role operations over JSON with bearer-token callers

use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use horizon_gateway::{build_backend, router, GatewayConfig, GatewayError};
use horizon_rbac::RepairScheduler;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "horizon_gateway=debug,horizon_rbac=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from_env()?;
    tracing::info!(store = ?config.store, data_dir = %config.portal.base_path.display(), "Starting");

    let backend = build_backend(&config).await?;

    // Reconciliation sweep, plus table upkeep on the Delta backend
    let mut repair = RepairScheduler::new(backend.state.service.clone());
    if let Some(store) = backend.delta.clone() {
        repair = repair.with_delta_store(store);
    }
    repair.start(config.portal.repair_interval());

    let app = router(backend.state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Horizon HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    repair.stop();
    Ok(())
}
