use anyhow::{Context, Result};
use axum::{Router, extract::FromRef};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::Settings,
    listings_api::{AccountSource, HttpApi, ListingSource, ManagementSource, SessionSource},
    manage::PropertyManager,
    search::SearchOrchestrator,
    session::SessionContext,
};

// Declare modules
mod config;
mod error;
mod filter;
mod listings_api;
mod manage;
mod models;
mod normalizer;
mod paginator;
mod routes;
mod search;
mod session;

#[cfg(test)]
mod testing;

// Define the application state struct
#[derive(Clone, FromRef)]
pub struct AppState {
    settings: Arc<Settings>,
    listings: Arc<dyn ListingSource>,
    accounts: Arc<dyn AccountSource>,
    session: Arc<SessionContext>,
    search: Arc<SearchOrchestrator>,
    manager: Arc<PropertyManager>,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        listings: Arc<dyn ListingSource>,
        management: Arc<dyn ManagementSource>,
        sessions: Arc<dyn SessionSource>,
        accounts: Arc<dyn AccountSource>,
    ) -> Self {
        let session = Arc::new(SessionContext::new(sessions));
        let search = Arc::new(SearchOrchestrator::new(
            listings.clone(),
            settings.filter_placement,
            settings.page_size,
        ));
        let manager = Arc::new(PropertyManager::new(management, session.clone()));
        AppState { settings, listings, accounts, session, search, manager }
    }
}

/// Routes plus static assets and request tracing.
pub fn build_app(app_state: AppState) -> Router {
    routes::create_router(app_state)
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "padfinder_rust=info,tower_http=info".into()))
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing PadFinder server...");

    // Load configuration
    let settings = match config::Settings::new() {
        Ok(s) => {
            tracing::info!(
                api = %s.api_origin(),
                page_size = s.page_size,
                placement = ?s.filter_placement,
                "Configuration loaded successfully."
            );
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {:#}", e);
            return Err(e);
        }
    };
    let settings = Arc::new(settings);

    // One client (and cookie store) for every remote call
    let api = Arc::new(HttpApi::new(&settings).context("Failed to build the remote API client")?);
    tracing::info!("Remote API client created.");

    let app_state = AppState::new(settings.clone(), api.clone(), api.clone(), api.clone(), api);

    // Session is checked once; pages read the shared context afterwards
    let session = app_state.session.initialize().await;
    tracing::debug!(?session, "Startup session state");

    let app = build_app(app_state.clone());

    let addr: SocketAddr = settings
        .server_address
        .parse()
        .with_context(|| format!("Invalid server address format: {}", settings.server_address))?;

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
