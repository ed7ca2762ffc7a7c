use axum::{
    Router,
    extract::{FromRef, OriginalUri, Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod listing;
pub mod memory;
pub mod models;
pub mod moderation;
pub mod pagination;
pub mod repository;
pub mod thread;
pub mod urls;
pub mod visibility;

// Router segregation (public, knowledge pages, moderation).
pub mod routes;
use auth::Viewer;
use routes::{knowledge, moderation as moderation_routes, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use memory::InMemoryRepository;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI description of every page and the context it renders, served at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::knowledge_index, handlers::knowledge_list, handlers::knowledge_list_category,
        handlers::show_thread, handlers::reply_to_thread, handlers::show_ask,
        handlers::submit_question, handlers::knowledge_moderate
    ),
    components(
        schemas(
            models::Question, models::Response, models::Category, models::Author,
            models::Company, models::Status, models::ListedQuestion, models::QuestionPage,
            models::AllowedMods, models::IndexPage, models::ListPage, models::ThreadPage,
            models::AskPage, forms::QuestionForm, forms::ResponseForm,
            forms::QuestionFormState, forms::ResponseFormState,
        )
    ),
    tags(
        (name = "knowledge-base", description = "Questions, responses and their moderation")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single state shared by every request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence behind the `Repository` trait (Postgres, or in-memory in tests).
    pub repo: RepositoryState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// login_guard
///
/// With `login_required` on, anonymous callers are redirected to the login page
/// with the path they asked for as `next`. Otherwise the request passes untouched.
async fn login_guard(
    State(config): State<AppConfig>,
    viewer: Viewer,
    OriginalUri(uri): OriginalUri,
    request: Request,
    next: Next,
) -> Response {
    if config.knowledge.login_required && !viewer.is_authenticated() {
        let target = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        tracing::debug!(path = %target, "anonymous request sent to login");
        return urls::found(&urls::login_with_next(&config.knowledge.login_url, target));
    }
    next.run(request).await
}

/// create_router
///
/// Assembles the routes, the login guard and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let guarded = knowledge::knowledge_routes()
        .merge(moderation_routes::moderation_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), login_guard));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(guarded)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, correlated by its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
