mod common;

use common::*;
use knowledge_base::{config::KnowledgeSettings, models::Status};
use serde_json::Value;

fn anonymous_allowed() -> KnowledgeSettings {
    KnowledgeSettings {
        allow_anonymous: true,
        ..KnowledgeSettings::default()
    }
}

#[tokio::test]
async fn test_member_reply_is_stored_and_redirects() {
    let repo = seeded_repo();
    let q = question(&repo, Some(ALICE_ID), "Needs help", Status::Public);
    let router = app(&repo);

    let reply = post(&router, &q.canonical_url(), Some(BOB_ID), "body=Try+this").await;
    assert_eq!(reply.status, 302);
    assert_eq!(reply.location.as_deref(), Some(q.canonical_url().as_str()));

    assert_eq!(repo.response_count(), 1);
    let stored = repo.response(q.id + 1).unwrap();
    assert_eq!(stored.body, "Try this");
    assert_eq!(stored.user_id, Some(BOB_ID));
    assert_eq!(stored.status, Status::Inherit);
}

#[tokio::test]
async fn test_anonymous_reply_with_phone_number_is_discarded() {
    let repo = seeded_repo();
    let q = question(&repo, None, "Spam target", Status::Public);
    let router = app_with(&repo, anonymous_allowed());

    let reply = post(
        &router,
        &q.canonical_url(),
        None,
        "body=Buy+now&name=Bot&email=bot%40spam.example&phone_number=555-0100",
    )
    .await;
    assert_eq!(reply.status, 302);
    assert_eq!(reply.location.as_deref(), Some(q.canonical_url().as_str()));
    assert_eq!(repo.response_count(), 0);
}

#[tokio::test]
async fn test_member_phone_number_is_not_spam() {
    let repo = seeded_repo();
    let q = question(&repo, None, "Call me", Status::Public);
    let router = app(&repo);

    let reply = post(&router, &q.canonical_url(), Some(BOB_ID), "body=Hi&phone_number=555").await;
    assert_eq!(reply.status, 302);
    assert_eq!(repo.response_count(), 1);
}

#[tokio::test]
async fn test_anonymous_reply_requires_name_and_email() {
    let repo = seeded_repo();
    let q = question(&repo, None, "Open question", Status::Public);
    let router = app_with(&repo, anonymous_allowed());

    let reply = post(&router, &q.canonical_url(), None, "body=Answer&email=not-an-address").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.json["form"]["errors"]["name"][0], "This field is required.");
    assert!(reply.json["form"]["errors"]["email"].is_array());
    assert_eq!(reply.json["form"]["body"], "Answer");
    assert_eq!(repo.response_count(), 0);

    let ok = post(
        &router,
        &q.canonical_url(),
        None,
        "body=Answer&name=Guest&email=guest%40example.com",
    )
    .await;
    assert_eq!(ok.status, 302);
    let stored = repo.response(q.id + 1).unwrap();
    assert_eq!(stored.name.as_deref(), Some("Guest"));
    assert_eq!(stored.user_id, None);
}

#[tokio::test]
async fn test_empty_reply_rerenders_with_errors() {
    let repo = seeded_repo();
    let q = question(&repo, None, "Open question", Status::Public);

    let reply = post(&app(&repo), &q.canonical_url(), Some(BOB_ID), "body=").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.json["form"]["errors"]["body"][0], "This field is required.");
    assert_eq!(repo.response_count(), 0);
}

#[tokio::test]
async fn test_reply_to_locked_question_writes_nothing() {
    let repo = seeded_repo();
    let q = question(&repo, Some(ALICE_ID), "Closed", Status::Public);
    repo.update_question(q.id, |q| q.locked = true);

    let reply = post(&app(&repo), &q.canonical_url(), Some(ALICE_ID), "body=Late").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.json["form"], Value::Null);
    assert_eq!(repo.response_count(), 0);
}

#[tokio::test]
async fn test_reply_to_drifted_url_redirects_without_writing() {
    let repo = seeded_repo();
    let q = question(&repo, None, "Proper title", Status::Public);

    let reply = post(&app(&repo), &format!("/thread/{}/stale/", q.id), Some(BOB_ID), "body=Hi").await;
    assert_eq!(reply.status, 301);
    assert_eq!(repo.response_count(), 0);
}

#[tokio::test]
async fn test_ask_page_form() {
    let repo = seeded_repo();
    repo.add_category("General", "general");
    let router = app(&repo);

    let member = get(&router, "/ask/", Some(ALICE_ID)).await;
    assert_eq!(member.status, 200);
    assert_eq!(member.json["template"], "knowledge/ask.html");
    assert_eq!(member.json["form"]["title"], "");
    assert_eq!(member.json["categories"][0]["slug"], "general");

    let anonymous = get(&router, "/ask/", None).await;
    assert_eq!(anonymous.json["form"], Value::Null);

    let open = app_with(&repo, anonymous_allowed());
    let anonymous = get(&open, "/ask/", None).await;
    assert_eq!(anonymous.json["form"]["ask_identity"], true);
}

#[tokio::test]
async fn test_ask_creates_private_question_and_redirects() {
    let repo = seeded_repo();
    let general = repo.add_category("General", "general");
    let router = app(&repo);

    let form = format!("title=Where+is+the+manual%3F&body=Cannot+find+it&categories={}", general.id);
    let reply = post(&router, "/ask/", Some(ALICE_ID), &form).await;
    assert_eq!(reply.status, 302);

    let created = repo.question(general.id + 1).unwrap();
    assert_eq!(reply.location, Some(created.canonical_url()));
    assert_eq!(created.status, Status::Private);
    assert_eq!(created.user_id, Some(ALICE_ID));

    // Private: its owner can read it, others cannot.
    assert_eq!(get(&router, &created.canonical_url(), Some(ALICE_ID)).await.status, 200);
    assert_eq!(get(&router, &created.canonical_url(), Some(BOB_ID)).await.status, 404);

    let thread = get(&router, &created.canonical_url(), Some(ALICE_ID)).await;
    assert_eq!(thread.json["question_categories"][0]["slug"], "general");
}

#[tokio::test]
async fn test_ask_auto_publicize() {
    let repo = seeded_repo();
    let router = app_with(
        &repo,
        KnowledgeSettings {
            auto_publicize: true,
            ..KnowledgeSettings::default()
        },
    );

    post(&router, "/ask/", Some(ALICE_ID), "title=Everyone+can+see").await;
    assert_eq!(repo.question(1).unwrap().status, Status::Public);
}

#[tokio::test]
async fn test_ask_validation_errors() {
    let repo = seeded_repo();
    let router = app(&repo);
    let long_title = "x".repeat(256);

    let reply = post(
        &router,
        "/ask/",
        Some(ALICE_ID),
        &format!("title={}&categories=42", long_title),
    )
    .await;
    assert_eq!(reply.status, 200);
    assert!(reply.json["form"]["errors"]["title"].is_array());
    assert!(reply.json["form"]["errors"]["categories"].is_array());
    assert_eq!(repo.question_count(), 0);

    let blank = post(&router, "/ask/", Some(ALICE_ID), "").await;
    assert_eq!(blank.json["form"]["errors"]["title"][0], "This field is required.");
}

#[tokio::test]
async fn test_anonymous_ask_spam_goes_to_index() {
    let repo = seeded_repo();
    let router = app_with(&repo, anonymous_allowed());

    let reply = post(
        &router,
        "/ask/",
        None,
        "title=Cheap+pills&name=Bot&email=bot%40spam.example&phone_number=1",
    )
    .await;
    assert_eq!(reply.status, 302);
    assert_eq!(reply.location.as_deref(), Some("/"));
    assert_eq!(repo.question_count(), 0);
}

#[tokio::test]
async fn test_anonymous_ask_when_disabled_writes_nothing() {
    let repo = seeded_repo();

    let reply = post(
        &app(&repo),
        "/ask/",
        None,
        "title=Hello&name=Guest&email=guest%40example.com",
    )
    .await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.json["form"], Value::Null);
    assert_eq!(repo.question_count(), 0);
}
