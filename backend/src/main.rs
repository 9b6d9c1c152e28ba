// backend/src/main.rs

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use routedesk_api::{
    app,
    assignment::AssignmentService,
    config::AppConfig,
    db,
    store::PgStore,
    ticketing::HttpTicketingClient,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,routedesk_api=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    // Initialize DB pool
    let pool = db::connect(&config).await?;
    let store = Arc::new(PgStore::new(pool));
    let ticketing = Arc::new(HttpTicketingClient::new(config.ticketing.clone())?);
    let state = AppState { service: AssignmentService::new(store, ticketing) };

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, ticketing = %config.ticketing.base_url, "API listening");

    axum::serve(listener, app(state).into_make_service()).await?;
    Ok(())
}
