mod config;
mod sweeper;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method, header::CONTENT_TYPE};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use forum_api::oauth::{OAuthStateStore, ProviderClient};
use forum_api::password::PasswordHasher;
use forum_api::{AppState, AppStateInner, router};
use forum_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forum=debug,forum_api=debug,forum_db=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    let hasher = PasswordHasher::new(config.hash_cost)?;
    let oauth_provider = ProviderClient::new(config.provider.clone())?;
    if !oauth_provider.is_configured() {
        warn!("FORUM_OAUTH_CLIENT_ID/FORUM_OAUTH_CLIENT_SECRET not set; provider login will fail");
    }

    let state: AppState = Arc::new(AppStateInner {
        db,
        hasher,
        settings: config.auth.clone(),
        oauth_states: OAuthStateStore::default(),
        oauth_provider,
    });

    tokio::spawn(sweeper::run_sweep_loop(state.clone(), config.sweep_interval_secs));

    let origins = config
        .allowed_origins
        .iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid origin {:?}", o)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    // Cookie auth needs credentials, which rules out a wildcard origin.
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    let app = router::build(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!("Forum server listening on {}", config.addr);
    info!(
        "Sessions last {} hours; database at {}",
        config.auth.session_ttl.num_hours(),
        config.db_path.display()
    );

    let listener = tokio::net::TcpListener::bind(config.addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
