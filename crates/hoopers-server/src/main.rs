use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use hoopers_api::auth::{AppState, AppStateInner};
use hoopers_server::{app, cleanup};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hoopers=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("HOOPERS_JWT_SECRET").unwrap_or_default();
    if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
        eprintln!("FATAL: HOOPERS_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    let db_path = std::env::var("HOOPERS_DB_PATH").unwrap_or_else(|_| "hoopers.db".into());
    let host = std::env::var("HOOPERS_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("HOOPERS_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let media_base_url = std::env::var("HOOPERS_MEDIA_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:3300/media".into());
    let retention_days: i64 = std::env::var("HOOPERS_NOTIFICATION_RETENTION_DAYS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30);

    // Init database
    let db = hoopers_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner { db, jwt_secret, media_base_url });

    // Background prune of read notifications (runs every hour)
    tokio::spawn(cleanup::run_notification_prune(state.clone(), 3600, retention_days));

    let router = app(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Hoopers server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
