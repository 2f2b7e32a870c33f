//! # rfidreg API Server
//!
//! REST API for the RFID tag registry, consumed by the cash-register
//! admin frontend.
//!
//! ## Endpoints
//!
//! - `GET /api/v1/tags` - List registered tags
//! - `PUT /api/v1/tags` - Register the next scanned tag to a username
//! - `DELETE /api/v1/tags?uid=…` - Remove a tag (by scan when `uid` is absent)
//! - `GET /api/v1/tags/:uid` - Look up one tag
//! - `GET /api/v1/access/:uid` - Access check for a presented tag
//! - `GET /api/v1/reader` - Reader status
//! - `POST /api/v1/reader/cancel` - Cancel the pending registration
//!
//! ## Example
//!
//! ```rust,ignore
//! use rfidreg_api::{ApiServer, AppState, ServiceConfig};
//!
//! let state = AppState::open(ServiceConfig::from_env()?, device).await?;
//! let server = ApiServer::new(state);
//! server.run(([0, 0, 0, 0], 3001)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod routes;
mod handlers;
mod state;
mod dto;
mod error;

pub use routes::create_router;
pub use state::{AppState, ServiceConfig};
pub use error::ApiError;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 16 * 1024;

/// API server for the tag registry.
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    /// Creates a new API server over the given state.
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Returns the shared state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Creates the router with all routes and layers configured.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        create_router(self.state.clone())
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Runs the server on the given address.
    pub async fn run(self, addr: impl Into<SocketAddr>) -> std::io::Result<()> {
        self.run_until(addr, std::future::pending()).await
    }

    /// Runs the server until `shutdown` resolves, then drains open requests.
    pub async fn run_until(
        self,
        addr: impl Into<SocketAddr>,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        let addr = addr.into();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("rfidreg API server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }
}
