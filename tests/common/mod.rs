#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use knowledge_base::{
    AppConfig, AppState, InMemoryRepository, RepositoryState,
    auth::{ROLE_ADMIN, ROLE_MODERATOR},
    config::KnowledgeSettings,
    create_router,
    models::{NewQuestion, NewResponse, Question, Response, Status, User},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_ID: Uuid = Uuid::from_u128(0xa1);
pub const MODERATOR_ID: Uuid = Uuid::from_u128(0xb2);
pub const ALICE_ID: Uuid = Uuid::from_u128(0xc3);
pub const BOB_ID: Uuid = Uuid::from_u128(0xd4);

pub const FORM: &str = "application/x-www-form-urlencoded";

/// A repository with the four standard users and nothing else.
pub fn seeded_repo() -> Arc<InMemoryRepository> {
    let repo = Arc::new(InMemoryRepository::new());
    for (id, email, role) in [
        (ADMIN_ID, "admin@example.com", ROLE_ADMIN),
        (MODERATOR_ID, "mod@example.com", ROLE_MODERATOR),
        (ALICE_ID, "alice@example.com", "member"),
        (BOB_ID, "bob@example.com", "member"),
    ] {
        repo.add_user(User {
            id,
            email: email.to_string(),
            role: role.to_string(),
        });
    }
    repo
}

pub fn state_with(repo: &Arc<InMemoryRepository>, knowledge: KnowledgeSettings) -> AppState {
    AppState {
        repo: repo.clone() as RepositoryState,
        config: AppConfig {
            knowledge,
            ..AppConfig::default()
        },
    }
}

pub fn app(repo: &Arc<InMemoryRepository>) -> Router {
    app_with(repo, KnowledgeSettings::default())
}

pub fn app_with(repo: &Arc<InMemoryRepository>, knowledge: KnowledgeSettings) -> Router {
    create_router(state_with(repo, knowledge))
}

pub fn question(
    repo: &InMemoryRepository,
    owner: Option<Uuid>,
    title: &str,
    status: Status,
) -> Question {
    repo.add_question(NewQuestion {
        user_id: owner,
        title: title.to_string(),
        body: format!("Body of {}", title),
        status,
        ..NewQuestion::default()
    })
}

pub fn response(
    repo: &InMemoryRepository,
    question_id: i64,
    author: Option<Uuid>,
    body: &str,
    status: Status,
) -> Response {
    repo.add_response(NewResponse {
        question_id,
        user_id: author,
        body: body.to_string(),
        status,
        ..NewResponse::default()
    })
}

/// TestResponse
///
/// What a test needs from one round trip.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub json: Value,
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    user: Option<Uuid>,
    form: Option<&str>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = user {
        builder = builder.header("x-user-id", id.to_string());
    }
    let body = match form {
        Some(form) => {
            builder = builder.header(header::CONTENT_TYPE, FORM);
            Body::from(form.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|value| value.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    TestResponse {
        status,
        location,
        json,
    }
}

pub async fn get(router: &Router, uri: &str, user: Option<Uuid>) -> TestResponse {
    send(router, Method::GET, uri, user, None).await
}

pub async fn post(router: &Router, uri: &str, user: Option<Uuid>, form: &str) -> TestResponse {
    send(router, Method::POST, uri, user, Some(form)).await
}

/// Titles of the questions on one listing page, in order.
pub fn titles(page: &Value) -> Vec<String> {
    page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["question"]["title"].as_str().unwrap().to_string())
        .collect()
}

pub fn not_found_body() -> Value {
    serde_json::json!({ "detail": "Not found" })
}
