mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use moari_api::auth::{AppState, AppStateInner};
use moari_api::identity::GoogleVerifier;
use moari_api::router::build_router;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moari=debug,moari_api=debug,moari_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = moari_db::Database::open(&config.db_path)?;

    let google = config.google_client_id.clone().map(GoogleVerifier::new);
    if google.is_none() {
        info!("MOARI_GOOGLE_CLIENT_ID not set; Google sign-in disabled");
    }

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        token_ttl: config.token_ttl,
        google,
    });

    let app = build_router(state, config.body_limit_mb * 1024 * 1024);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Moari server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
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
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
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
