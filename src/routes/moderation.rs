use crate::{AppState, handlers};
use axum::{Router, routing::any};

/// Moderation Router Module
///
/// Registered for every method so that a GET is answered with the same 404 as
/// any other refused moderation request, rather than a 405 that would reveal the
/// endpoint.
pub fn moderation_routes() -> Router<AppState> {
    Router::new().route(
        "/moderate/{model}/{lookup_id}/{mod}/",
        any(handlers::knowledge_moderate),
    )
}
