use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hotelbook_rust::{
    backend::{self, BackendClient},
    config::Settings,
    create_app,
    session::SystemClock,
    storage_from_settings, AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "hotelbook_rust=info,tower_http=info".into()))
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing hotel booking front-end...");

    // Load configuration
    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!(backend_url = %s.backend_url, timeout_secs = s.session.timeout_secs, "Configuration loaded successfully.");
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };
    let shared_settings = Arc::new(settings);

    // One HTTP client shared by every backend call
    let http_client = Arc::new(backend::build_http_client()?);
    let backend = Arc::new(BackendClient::new(http_client, shared_settings.backend_url.clone()));
    let storage = storage_from_settings(&shared_settings).context("Failed to open visitor storage")?;

    let app_state = AppState::new(shared_settings.clone(), backend, storage, Arc::new(SystemClock));
    let app = create_app(app_state);

    // Parse the server address from settings
    let addr: SocketAddr = shared_settings.server_address.parse().with_context(|| {
        format!("Invalid server address format: {}", shared_settings.server_address)
    })?;

    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => {
            tracing::info!("Server listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
