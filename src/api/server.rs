//! HTTP server
//!
//! Binds the listener, wires handlers to routes, and runs until the shutdown
//! future resolves.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers;
use crate::cache::ImageCache;
use crate::origin::RemoteOrigin;
use crate::store::RecordStore;

/// Largest accepted request body (image uploads)
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Clients shared by every request, constructed once at startup
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub origin: Arc<dyn RemoteOrigin>,
    pub cache: ImageCache,
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/entries",
            get(handlers::list_students).post(handlers::create_student),
        )
        .route(
            "/entries/{id}",
            get(handlers::get_student)
                .put(handlers::update_student)
                .delete(handlers::delete_student),
        )
        .route("/cache/{filename}", get(handlers::serve_image))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP server bound to a local address
pub struct ApiServer {
    listener: TcpListener,
    state: Arc<AppState>,
}

impl ApiServer {
    /// Bind the listener
    pub async fn bind(addr: SocketAddr, state: Arc<AppState>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!(addr = %listener.local_addr()?, "API server listening");
        Ok(Self { listener, state })
    }

    /// Serve requests until `shutdown` resolves, then drain in-flight ones
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = create_router(self.state);
        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("API server error")?;

        info!("API server stopped");
        Ok(())
    }
}
