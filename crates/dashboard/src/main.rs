use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kb_common::store_client::EntryStoreClient;
use kb_dashboard::config::Config;
use kb_dashboard::dashboard::Dashboard;
use kb_dashboard::server::create_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting knowledge-base dashboard");

    let config = Config::from_env()?;
    info!(
        base_url = %config.store.base_url,
        timeout_ms = config.store.default_timeout.as_millis(),
        max_retries = config.store.max_retries,
        "backend client configured"
    );
    let store = Arc::new(EntryStoreClient::new(config.store.clone())?);
    let dashboard = Arc::new(Dashboard::new(store));

    // The API is usable without a first load; POST /api/load retries it.
    if let Err(e) = dashboard.load().await {
        warn!(error = %e, "initial load failed, starting empty");
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = create_router(dashboard).layer(cors);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "dashboard listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("dashboard shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
}
