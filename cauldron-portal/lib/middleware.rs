//! Middleware components for the cauldron portal.

use axum::{body::Body, http::Request, middleware::Next, response::IntoResponse};

//--------------------------------------------------------------------------------------------------
// Middleware Functions
//--------------------------------------------------------------------------------------------------

/// Log incoming requests
pub async fn logging_middleware(req: Request<Body>, next: Next) -> impl IntoResponse {
    let method = req.method().clone();
    let uri = req.uri().clone();

    tracing::info!("Request: {} {}", method, uri);

    let response = next.run(req).await;

    tracing::info!("Response: {} {}: {}", method, uri, response.status());

    response
}
