//! # TaskTrack Server
//!
//! Multi-user task tracker: tasks with due dates, status and attachments,
//! gated by roles that grant named permissions.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/tasktrack JWT_SECRET=... cargo run -p tasktrack-api
//! ```

use std::sync::Arc;

use tasktrack_api::{
    app::{build_app, AppState},
    config::Config,
};
use tasktrack_shared::{
    db::{
        migrations::{ensure_database_exists, run_migrations},
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    storage::LocalFileStore,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tasktrack_api=debug,tasktrack_shared=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("TaskTrack v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    ensure_database_exists(&config.database.url).await?;
    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;
    run_migrations(&pool).await?;

    let store = LocalFileStore::new(config.uploads.dir.clone())?;
    tracing::info!(dir = %store.root().display(), "Upload storage ready");

    let address = config.bind_address();
    let state = AppState::new(pool.clone(), config, Arc::new(store))?;
    let app = build_app(state);

    let listener = TcpListener::bind(&address).await?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, axum::ServiceExt::<axum::extract::Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, closing database pool");
    close_pool(pool).await;

    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
