//! Student Registry Daemon
//!
//! Serves the student records API. Missing cached images are pulled from the
//! GitHub mirror before the listener opens.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use student_registry::api::{ApiServer, AppState};
use student_registry::cache::{reconcile, ImageCache};
use student_registry::config::Config;
use student_registry::origin::{GitHubClient, RemoteOrigin};
use student_registry::store::{RecordStore, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::parse();

    let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::open(&config.database_url()?)?);
    let cache = ImageCache::new(&config.cache_dir)?;
    let origin: Arc<dyn RemoteOrigin> = Arc::new(
        GitHubClient::new(config.github_token(), config.repo_target())
            .context("Failed to create GitHub client")?,
    );

    if config.skip_reconcile {
        warn!("Skipping startup cache reconciliation");
    } else {
        info!("Caching GitHub images...");
        if let Err(e) = reconcile(store.as_ref(), origin.as_ref(), &cache).await {
            warn!(error = %format!("{:#}", e), "Cache reconciliation aborted, serving without it");
        }
    }

    let state = Arc::new(AppState {
        store,
        origin,
        cache,
    });

    let server = ApiServer::bind(config.bind, Arc::clone(&state)).await?;
    info!("Daemon ready. Press Ctrl+C to stop.");

    server.run(shutdown_signal()).await?;

    // Last reference: closes the database connection and HTTP client pool
    drop(state);
    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal, draining requests..."),
        Err(e) => {
            warn!(error = %e, "Failed to listen for shutdown signal, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
