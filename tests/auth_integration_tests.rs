mod common;

use axum::{
    extract::FromRequestParts,
    http::{Request, StatusCode, request::Parts},
};
use common::*;
use knowledge_base::{
    AppState,
    auth::{AuthUser, Claims, Permission, Viewer},
    config::{Env, KnowledgeSettings},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
}

fn token_for(sub: Uuid, secret: &str, exp: usize) -> String {
    let claims = Claims {
        sub,
        exp,
        iat: now(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn parts(headers: &[(&str, String)]) -> Parts {
    let mut builder = Request::builder().uri("/");
    for (name, value) in headers {
        builder = builder.header(*name, value.as_str());
    }
    builder.body(()).unwrap().into_parts().0
}

fn state() -> AppState {
    state_with(&seeded_repo(), KnowledgeSettings::default())
}

async fn extract(state: &AppState, headers: &[(&str, String)]) -> Result<Viewer, StatusCode> {
    Viewer::from_request_parts(&mut parts(headers), state).await
}

#[tokio::test]
async fn test_no_credentials_is_anonymous() {
    let viewer = extract(&state(), &[]).await.unwrap();
    assert_eq!(viewer, Viewer::Anonymous);
    assert!(!viewer.is_authenticated());
}

#[tokio::test]
async fn test_valid_bearer_token_resolves_user_and_role() {
    let state = state();
    let token = token_for(MODERATOR_ID, &state.config.jwt_secret, now() + 3600);

    let viewer = extract(&state, &[("authorization", format!("Bearer {}", token))])
        .await
        .unwrap();
    assert_eq!(viewer.user_id(), Some(MODERATOR_ID));
    assert!(viewer.is_staff());
    assert!(viewer.has_perm(Permission::ChangeResponse));
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let state = state();
    let token = token_for(ALICE_ID, &state.config.jwt_secret, now() - 3600);

    let result = extract(&state, &[("authorization", format!("Bearer {}", token))]).await;
    assert_eq!(result, Err(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn test_wrong_secret_and_malformed_header_are_rejected() {
    let state = state();
    let forged = token_for(ALICE_ID, "some-other-secret", now() + 3600);

    let forged_result = extract(&state, &[("authorization", format!("Bearer {}", forged))]).await;
    assert_eq!(forged_result, Err(StatusCode::UNAUTHORIZED));

    let basic = extract(&state, &[("authorization", "Basic dXNlcjpwYXNz".to_string())]).await;
    assert_eq!(basic, Err(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn test_token_for_unknown_user_is_rejected() {
    let state = state();
    let token = token_for(Uuid::new_v4(), &state.config.jwt_secret, now() + 3600);

    let result = extract(&state, &[("authorization", format!("Bearer {}", token))]).await;
    assert_eq!(result, Err(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn test_local_header_bypass() {
    let state = state();
    let viewer = extract(&state, &[("x-user-id", ALICE_ID.to_string())]).await.unwrap();
    assert_eq!(viewer.user_id(), Some(ALICE_ID));
    assert!(!viewer.is_staff());

    // Unknown ids fall through to the normal path.
    let unknown = extract(&state, &[("x-user-id", Uuid::new_v4().to_string())]).await.unwrap();
    assert_eq!(unknown, Viewer::Anonymous);
}

#[tokio::test]
async fn test_header_bypass_disabled_in_production() {
    let mut state = state();
    state.config.env = Env::Production;

    let viewer = extract(&state, &[("x-user-id", ADMIN_ID.to_string())]).await.unwrap();
    assert_eq!(viewer, Viewer::Anonymous);
}

#[test]
fn test_role_permissions() {
    let admin = AuthUser {
        id: ADMIN_ID,
        role: "admin".to_string(),
    };
    let moderator = AuthUser {
        id: MODERATOR_ID,
        role: "moderator".to_string(),
    };
    let member = AuthUser {
        id: ALICE_ID,
        role: "member".to_string(),
    };

    assert!(admin.is_staff() && admin.has_perm(Permission::ChangeQuestion));
    assert!(moderator.is_staff() && moderator.has_perm(Permission::ChangeQuestion));
    assert!(!member.is_staff());
    assert!(!member.has_perm(Permission::ChangeQuestion));
    assert!(!member.has_perm(Permission::ChangeResponse));
    assert!(!Viewer::Anonymous.has_perm(Permission::ChangeResponse));
}
