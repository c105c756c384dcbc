//! HTTP tile service: resolves tile addresses, checks map resources out of
//! a keyed pool, renders, and serves the encoded image.

use std::sync::Arc;

use axum::{extract::Extension, routing::get, Router};

pub mod config;
pub mod handlers;
pub mod png;
pub mod render;
pub mod state;
pub mod style;

pub use config::ServerConfig;
pub use state::AppState;

/// Build the application router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/tiles/:style/:z/:x/:y", get(handlers::tile_path_handler))
        .route("/tiles/:style", get(handlers::tile_query_handler))
        .route("/health", get(handlers::health_handler))
        .layer(Extension(state))
}
