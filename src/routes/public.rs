use crate::AppState;
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints that never pass through the login guard.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Load balancer check. Answers even when every page requires login.
        .route("/health", get(|| async { "ok" }))
}
