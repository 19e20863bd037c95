//! HTTP front-end for episode stream resolution
//!
//! # Routes
//!
//! - `GET /resolve?title=<t>&episode=<n>&source=<provider?>&forceRefresh=<bool?>`
//!   (`id=<catalog id>` may replace `title`)
//! - `GET /providers`
//!
//! ```ignore
//! let state = AppState::new(ResolutionService::from_config(&ResolverConfig::default())?);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, anistream_server::create_router(state)).await?;
//! ```

use std::sync::Arc;

use anistream_core::ResolutionService;
use axum::{Router, routing::get};

pub mod error;
pub mod handlers;

pub use error::AppError;

/// Shared across handlers; the service holds the read-only registry and cache
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ResolutionService>,
}

impl AppState {
    pub fn new(service: ResolutionService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/resolve", get(handlers::resolve))
        .route("/providers", get(handlers::providers))
        .with_state(state)
}
