//! API module for the bridge

pub mod error;
pub mod handlers;

use axum::{
    http::{Method, Uri},
    routing::any,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;

use error::ApiError;
use handlers::AppState;

/// Fallback for every unmatched path
pub async fn forbidden(method: Method, uri: Uri) -> ApiError {
    debug!(url = %uri.path(), method = %method, "Rejecting unknown path");
    ApiError::Forbidden
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/get_key", any(handlers::get_key))
        .route("/set_key", any(handlers::set_key))
        .route("/del_key", any(handlers::del_key))
        .fallback(forbidden)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
