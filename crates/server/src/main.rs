use anyhow::Context;
use deployment::Deployment;
use server::{DeploymentImpl, routes};
use tracing::{info, warn};
use utils::{assets::data_dir, logging::init_tracing};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3001;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("info");

    let deployment = DeploymentImpl::new()
        .await
        .context("Failed to initialise deployment")?;
    info!(data_dir = %data_dir().display(), "Deployment ready");

    let host = std::env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = match std::env::var("PORT") {
        Ok(raw) => raw.parse::<u16>().unwrap_or_else(|_| {
            warn!(port = %raw, "Invalid PORT, using {}", DEFAULT_PORT);
            DEFAULT_PORT
        }),
        Err(_) => DEFAULT_PORT,
    };
    let addr = format!("{host}:{port}");

    let app = routes::router(deployment);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
