use anyhow::Result;
use clap::Parser;
use client_console_service::{open_store, router, AppState, ServiceConfig};
use client_console_sync::ClientRepository;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Client Console Service v{}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::parse();
    let addr = config.validate()?;

    let store = open_store(&config)?;
    let state = AppState {
        repository: Arc::new(ClientRepository::new(store)),
        page_size: config.page_size,
    };

    let app = router(state);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
