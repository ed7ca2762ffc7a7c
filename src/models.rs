use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::forms::{QuestionFormState, ResponseFormState};
use crate::urls;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The identity record stored in the `users` table. Only what authentication and
/// authorization need: the id carried by the JWT `sub` claim and the role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    // 'admin', 'moderator' or 'member'.
    pub role: String,
}

/// Status
///
/// Visibility state of a question or response. Stored as the `knowledge_status`
/// Postgres enum. Questions only ever use `public`, `private` and `internal`;
/// `inherit` makes a response follow its parent question.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "knowledge_status", rename_all = "lowercase")]
#[ts(export)]
pub enum Status {
    Public,
    #[default]
    Private,
    Internal,
    Inherit,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Public => "public",
            Status::Private => "private",
            Status::Internal => "internal",
            Status::Inherit => "inherit",
        }
    }
}

/// Question
///
/// A row of the `questions` table. `user_id` is empty for anonymous askers, who
/// leave a name and email instead.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Question {
    pub id: i64,
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub title: String,
    pub body: String,
    pub status: Status,
    pub locked: bool,
    pub recommended: bool,
    pub hits: i64,
    #[ts(type = "string")]
    pub added: DateTime<Utc>,
    #[ts(type = "string")]
    pub lastchanged: DateTime<Utc>,
}

impl Question {
    /// The single authoritative address of this thread.
    pub fn canonical_url(&self) -> String {
        urls::question_url(self.id, &self.title)
    }
}

/// Response
///
/// A row of the `responses` table. `phone_number` is whatever the honeypot field
/// held when an authenticated member submitted it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Response {
    pub id: i64,
    pub question_id: i64,
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub body: String,
    pub status: Status,
    pub accepted: bool,
    pub phone_number: Option<String>,
    #[ts(type = "string")]
    pub added: DateTime<Utc>,
    #[ts(type = "string")]
    pub lastchanged: DateTime<Utc>,
}

/// Category
///
/// Static reference data; `slug` is unique and addresses `/list/<slug>/`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub slug: String,
}

/// Author
///
/// Optional profile of a user. `company` holds a company name, resolved against
/// the `companies` table for display.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Author {
    pub user_id: Uuid,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub website: Option<String>,
}

// --- Insert Payloads ---

/// NewQuestion
///
/// Validated question ready to persist. Built by the question form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewQuestion {
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub title: String,
    pub body: String,
    pub status: Status,
    pub category_ids: Vec<i64>,
}

/// NewResponse
///
/// Validated response ready to persist. Built by the response form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewResponse {
    pub question_id: i64,
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub body: String,
    pub status: Status,
    pub phone_number: Option<String>,
}

// --- Page Contexts (Output) ---

/// ListedQuestion
///
/// A question as it appears in a listing, already paired with its categories and
/// with the responses the requesting user is allowed to see.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ListedQuestion {
    pub question: Question,
    pub categories: Vec<Category>,
    pub responses: Vec<Response>,
}

/// QuestionPage
///
/// One page of a paginated question listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct QuestionPage {
    pub items: Vec<ListedQuestion>,
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

/// AllowedMods
///
/// The moderation actions a thread page may offer, per entity type.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct AllowedMods {
    pub question: Vec<String>,
    pub response: Vec<String>,
}

/// IndexPage
///
/// Context of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct IndexPage {
    pub template: String,
    pub base_template: String,
    pub author: Option<Author>,
    /// The first twenty visible questions, newest first.
    pub questions: QuestionPage,
    /// Every visible question by hit count.
    pub popular: QuestionPage,
    /// Only present when at least one visible question is recommended.
    pub recommended: Option<QuestionPage>,
    pub my_questions: Option<Vec<Question>>,
    pub categories: Vec<Category>,
}

/// ListPage
///
/// Context of `GET /list/` and `GET /list/<slug>/`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ListPage {
    pub template: String,
    pub base_template: String,
    pub search: Option<String>,
    pub category: Option<Category>,
    pub questions: QuestionPage,
    pub author: Option<Author>,
    pub my_questions: Option<Vec<Question>>,
    pub categories: Vec<Category>,
    pub form: Option<QuestionFormState>,
}

/// ThreadPage
///
/// Context of `GET|POST /thread/<id>/<slug>/`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ThreadPage {
    pub template: String,
    pub base_template: String,
    pub question: Question,
    pub question_categories: Vec<Category>,
    /// Company of the question's author, when both profile and company exist.
    pub company: Option<Company>,
    /// Profile of the requesting user.
    pub author: Option<Author>,
    /// Profile of the question's author.
    pub author_instance: Option<Author>,
    pub responses: Vec<Response>,
    pub allowed_mods: AllowedMods,
    pub form: Option<ResponseFormState>,
    pub my_questions: Option<Vec<Question>>,
    pub categories: Vec<Category>,
}

/// AskPage
///
/// Context of `GET|POST /ask/`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AskPage {
    pub template: String,
    pub base_template: String,
    pub form: Option<QuestionFormState>,
    pub my_questions: Option<Vec<Question>>,
    pub categories: Vec<Category>,
}
