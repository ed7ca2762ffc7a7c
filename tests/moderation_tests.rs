mod common;

use common::*;
use knowledge_base::{
    auth::{AuthUser, Viewer},
    models::Status,
    moderation::{self, EntityKind, Moderation, QuestionAction, ResponseAction},
};

fn staff(role: &str) -> Viewer {
    Viewer::User(AuthUser {
        id: ADMIN_ID,
        role: role.to_string(),
    })
}

#[tokio::test]
async fn test_moderation_scenario() {
    let repo = seeded_repo();
    let q1 = question(&repo, Some(ALICE_ID), "First question", Status::Private);
    let q2 = question(&repo, None, "Second question", Status::Public);
    let r3 = response(&repo, q1.id, Some(BOB_ID), "An answer", Status::Public);
    assert_eq!((q1.id, q2.id, r3.id), (1, 2, 3));
    let router = app(&repo);

    let bad_question_action = post(&router, "/moderate/question/1/inherit/", Some(ADMIN_ID), "").await;
    assert_eq!(bad_question_action.status, 404);
    assert_eq!(bad_question_action.json, not_found_body());

    let publish = post(&router, "/moderate/question/1/public/", Some(ADMIN_ID), "").await;
    assert_eq!(publish.status, 302);
    assert_eq!(publish.location.as_deref(), Some("/thread/1/first-question/"));
    assert_eq!(repo.question(1).unwrap().status, Status::Public);

    let bad_response_action = post(&router, "/moderate/response/3/notreal/", Some(ADMIN_ID), "").await;
    assert_eq!(bad_response_action.status, 404);

    let inherit = post(&router, "/moderate/response/3/inherit/", Some(ADMIN_ID), "").await;
    assert_eq!(inherit.status, 302);
    assert_eq!(inherit.location.as_deref(), Some("/thread/1/first-question/"));
    assert_eq!(repo.response(3).unwrap().status, Status::Inherit);
}

#[tokio::test]
async fn test_refusals_are_indistinguishable() {
    let repo = seeded_repo();
    let q = question(&repo, None, "Target", Status::Public);
    let router = app(&repo);
    let uri = format!("/moderate/question/{}/lock/", q.id);

    let refusals = [
        // Wrong method.
        get(&router, &uri, Some(ADMIN_ID)).await,
        // Unknown model.
        post(&router, &format!("/moderate/category/{}/lock/", q.id), Some(ADMIN_ID), "").await,
        // No permission.
        post(&router, &uri, Some(BOB_ID), "").await,
        post(&router, &uri, None, "").await,
        // Malformed id.
        post(&router, "/moderate/question/abc/lock/", Some(ADMIN_ID), "").await,
        // Missing target.
        post(&router, "/moderate/question/999/lock/", Some(ADMIN_ID), "").await,
    ];
    for refusal in refusals {
        assert_eq!(refusal.status, 404);
        assert_eq!(refusal.json, not_found_body());
        assert_eq!(refusal.location, None);
    }
    assert!(!repo.question(q.id).unwrap().locked);
}

#[tokio::test]
async fn test_moderator_may_moderate_but_member_may_not() {
    let repo = seeded_repo();
    let q = question(&repo, Some(BOB_ID), "Bob's question", Status::Public);
    let router = app(&repo);
    let uri = format!("/moderate/question/{}/private/", q.id);

    // Owning the question grants nothing.
    assert_eq!(post(&router, &uri, Some(BOB_ID), "").await.status, 404);
    assert_eq!(repo.question(q.id).unwrap().status, Status::Public);

    assert_eq!(post(&router, &uri, Some(MODERATOR_ID), "").await.status, 302);
    assert_eq!(repo.question(q.id).unwrap().status, Status::Private);
}

#[tokio::test]
async fn test_lock_toggles() {
    let repo = seeded_repo();
    let q = question(&repo, None, "Lockable", Status::Public);
    let router = app(&repo);
    let uri = format!("/moderate/question/{}/lock/", q.id);

    post(&router, &uri, Some(ADMIN_ID), "").await;
    assert!(repo.question(q.id).unwrap().locked);
    post(&router, &uri, Some(ADMIN_ID), "").await;
    assert!(!repo.question(q.id).unwrap().locked);
}

#[tokio::test]
async fn test_delete_question_falls_back_to_index() {
    let repo = seeded_repo();
    let q = question(&repo, None, "Doomed", Status::Public);
    let r = response(&repo, q.id, None, "goes too", Status::Inherit);

    let reply = post(&app(&repo), &format!("/moderate/question/{}/delete/", q.id), Some(ADMIN_ID), "").await;
    assert_eq!(reply.status, 302);
    assert_eq!(reply.location.as_deref(), Some("/"));
    assert!(repo.question(q.id).is_none());
    assert!(repo.response(r.id).is_none());
}

#[tokio::test]
async fn test_delete_response_redirects_to_parent() {
    let repo = seeded_repo();
    let q = question(&repo, None, "Parent", Status::Public);
    let r = response(&repo, q.id, None, "removed", Status::Public);

    let reply = post(&app(&repo), &format!("/moderate/response/{}/delete/", r.id), Some(MODERATOR_ID), "").await;
    assert_eq!(reply.location, Some(q.canonical_url()));
    assert_eq!(repo.response_count(), 0);
}

#[tokio::test]
async fn test_accept_and_clear_accepted() {
    let repo = seeded_repo();
    let q = question(&repo, None, "Which answer?", Status::Public);
    let first = response(&repo, q.id, None, "first", Status::Public);
    let second = response(&repo, q.id, None, "second", Status::Public);
    let router = app(&repo);

    post(&router, &format!("/moderate/response/{}/accept/", first.id), Some(ADMIN_ID), "").await;
    post(&router, &format!("/moderate/response/{}/accept/", second.id), Some(ADMIN_ID), "").await;
    assert!(!repo.response(first.id).unwrap().accepted);
    assert!(repo.response(second.id).unwrap().accepted);

    post(&router, &format!("/moderate/question/{}/clear_accepted/", q.id), Some(ADMIN_ID), "").await;
    assert!(!repo.response(second.id).unwrap().accepted);
}

#[tokio::test]
async fn test_status_change_touches_lastchanged() {
    let repo = seeded_repo();
    let q = question(&repo, None, "Touched", Status::Private);
    let before = repo.question(q.id).unwrap().lastchanged;

    let outcome = moderation::apply(
        repo.as_ref(),
        &staff("admin"),
        Moderation::Question {
            id: q.id,
            action: QuestionAction::Public,
        },
    )
    .await
    .unwrap();
    assert_eq!(outcome, Some(q.canonical_url()));
    assert!(repo.question(q.id).unwrap().lastchanged > before);
}

#[tokio::test]
async fn test_apply_on_invisible_target_is_none() {
    let repo = seeded_repo();
    let q = question(&repo, None, "Anywhere", Status::Public);

    let outcome = moderation::apply(
        repo.as_ref(),
        &staff("admin"),
        Moderation::Response {
            id: q.id + 100,
            action: ResponseAction::Public,
        },
    )
    .await
    .unwrap();
    assert_eq!(outcome, None);
}

#[test]
fn test_allow_lists_are_closed() {
    assert_eq!(
        Moderation::new(EntityKind::Question, 1, "lock"),
        Some(Moderation::Question {
            id: 1,
            action: QuestionAction::Lock,
        })
    );
    assert_eq!(Moderation::new(EntityKind::Question, 1, "accept"), None);
    assert_eq!(Moderation::new(EntityKind::Question, 1, "internal"), None);
    assert_eq!(Moderation::new(EntityKind::Response, 1, "lock"), None);
    assert_eq!(Moderation::new(EntityKind::Response, 1, "__init__"), None);
    assert_eq!(EntityKind::parse("Question"), None);

    for action in ResponseAction::ALL {
        assert_eq!(ResponseAction::parse(action.as_str()), Some(action));
    }
}
