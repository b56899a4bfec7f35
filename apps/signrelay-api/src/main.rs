//! Signing relay server

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use signrelay_api::{build_router, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("signrelay_api=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let config = Config::parse();
    let allowed_origin = config.validate()?;

    info!("Initializing signing relay...");
    let state = Arc::new(AppState::from_config(&config).await?);

    let app = build_router(state, allowed_origin.clone(), config.body_limit_bytes);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Starting signing relay on http://{}", addr);
    info!("Allowed origin: {:?}", allowed_origin);
    info!("Body limit: {} bytes", config.body_limit_bytes);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
