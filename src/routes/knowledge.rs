use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Knowledge Router Module
///
/// The reading and submission pages. Visibility is enforced inside the services
/// these handlers call, never here.
pub fn knowledge_routes() -> Router<AppState> {
    Router::new()
        // GET /?page=&popular_page=&recommended_page=
        .route("/", get(handlers::knowledge_index))
        // GET /list/?title=&page=
        .route("/list/", get(handlers::knowledge_list))
        // GET /list/{category_slug}/?title=&page=
        // Unknown slugs are 404.
        .route("/list/{category_slug}/", get(handlers::knowledge_list_category))
        // GET/POST /thread/{question_id}/[{slug}/]
        // Both shapes resolve the same question; anything but the canonical one
        // is answered with a 301.
        .route(
            "/thread/{question_id}/",
            get(handlers::show_thread).post(handlers::reply_to_thread),
        )
        .route(
            "/thread/{question_id}/{slug}/",
            get(handlers::show_thread).post(handlers::reply_to_thread),
        )
        // GET/POST /ask/
        .route("/ask/", get(handlers::show_ask).post(handlers::submit_question))
}
