//! Router configuration for the cauldron portal.
//!
//! This module handles:
//! - API route definitions
//! - Middleware integration
//! - CORS for the browser editor

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::{handler, middleware as app_middleware, state::AppState};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Create a new router with the given state
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(handler::health))
        .route("/rpc", post(handler::json_rpc_handler));

    Router::new()
        .nest("/api/v1", api)
        .layer(middleware::from_fn(app_middleware::logging_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
