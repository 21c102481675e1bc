//! HTTP server

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::Authenticator;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::http::handlers;
use crate::relay::Relay;

/// Application state shared by all handlers
pub struct AppState {
    pub relay: Arc<Relay>,
    pub authenticator: Arc<dyn Authenticator>,
    /// Realm advertised in `WWW-Authenticate` challenges
    pub realm: String,
}

/// HTTP server for the relay
pub struct WebServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(
        config: ServerConfig,
        relay: Arc<Relay>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let state = Arc::new(AppState {
            relay,
            authenticator,
            realm: config.realm.clone(),
        });

        Self { config, state }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        Router::new()
            .route(
                "/stream",
                post(handlers::ingest)
                    .put(handlers::ingest)
                    .layer(DefaultBodyLimit::disable()),
            )
            .route("/listen", get(handlers::listen))
            .route("/status", get(handlers::get_status))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive()),
            )
            .with_state(self.state.clone())
    }

    /// Bind the configured listen address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.bind_addr()?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Relay listening on http://{}", listener.local_addr()?);
        Ok(listener)
    }

    /// Serve until `shutdown` completes
    ///
    /// Open connections are not drained: listener streams only end with
    /// their session.
    pub async fn run_until<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let app = self.router();

        tokio::select! {
            result = axum::serve(listener, app).into_future() => result?,
            _ = shutdown => {
                tracing::info!("Received shutdown signal");
            }
        }

        Ok(())
    }

    /// Serve in a background task
    pub fn start_background(self, listener: TcpListener) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run_until(listener, std::future::pending()).await {
                tracing::error!("Web server error: {}", e);
            }
        })
    }
}
