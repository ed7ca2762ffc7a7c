//! Visibility Filter.
//!
//! Which questions and responses a viewer may see. The rules are stated twice with
//! the same meaning: as plain predicates over loaded rows, and as SQL fragments
//! pushed into a `QueryBuilder` so they compose with search, category and ordering.
//! Visibility is always evaluated at read time; nothing is cached.

use sqlx::{Postgres, QueryBuilder};

use crate::auth::Viewer;
use crate::models::{Question, Response, Status};

/// What a response's status means once `inherit` is resolved against its question.
pub fn effective_status(response: &Response, question: &Question) -> Status {
    match response.status {
        Status::Inherit => question.status,
        own => own,
    }
}

impl Viewer {
    /// Public questions, the viewer's own questions, or anything for staff.
    pub fn can_view_question(&self, question: &Question) -> bool {
        match self {
            Viewer::Anonymous => question.status == Status::Public,
            Viewer::User(user) if user.is_staff() => true,
            Viewer::User(user) => {
                question.status == Status::Public || question.user_id == Some(user.id)
            }
        }
    }

    /// Publicly visible responses, the viewer's own responses, private responses on
    /// the viewer's own question, or anything for staff.
    pub fn can_view_response(&self, response: &Response, question: &Question) -> bool {
        let effective = effective_status(response, question);
        match self {
            Viewer::Anonymous => effective == Status::Public,
            Viewer::User(user) if user.is_staff() => true,
            Viewer::User(user) => {
                effective == Status::Public
                    || response.user_id == Some(user.id)
                    || (effective == Status::Private && question.user_id == Some(user.id))
            }
        }
    }

    /// Pushes the question predicate for a `questions` table aliased `q`.
    pub fn push_question_predicate(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Viewer::Anonymous => {
                builder.push("q.status = 'public'");
            }
            Viewer::User(user) if user.is_staff() => {
                builder.push("TRUE");
            }
            Viewer::User(user) => {
                builder.push("(q.status = 'public' OR q.user_id = ");
                builder.push_bind(user.id);
                builder.push(")");
            }
        }
    }

    /// Pushes the response predicate for `responses r JOIN questions q`.
    pub fn push_response_predicate(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        const EFFECTIVE_PUBLIC: &str =
            "(r.status = 'public' OR (r.status = 'inherit' AND q.status = 'public'))";
        const EFFECTIVE_PRIVATE: &str =
            "(r.status = 'private' OR (r.status = 'inherit' AND q.status = 'private'))";

        match self {
            Viewer::Anonymous => {
                builder.push(EFFECTIVE_PUBLIC);
            }
            Viewer::User(user) if user.is_staff() => {
                builder.push("TRUE");
            }
            Viewer::User(user) => {
                builder.push("(");
                builder.push(EFFECTIVE_PUBLIC);
                builder.push(" OR r.user_id = ");
                builder.push_bind(user.id);
                builder.push(" OR (");
                builder.push(EFFECTIVE_PRIVATE);
                builder.push(" AND q.user_id = ");
                builder.push_bind(user.id);
                builder.push("))");
            }
        }
    }
}
