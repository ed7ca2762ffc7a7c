use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::auth::Viewer;
use crate::config::KnowledgeSettings;
use crate::models::{Category, NewQuestion, NewResponse, Question, Status};

pub const TITLE_MAX_LEN: usize = 255;

/// Field name -> messages. Empty means the form is valid.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// QuestionForm
///
/// Urlencoded body of `POST /ask/`. Every field defaults to empty so a sparse body
/// is reported as validation errors rather than rejected by the extractor.
/// `categories` is a comma-separated list of category ids.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct QuestionForm {
    pub title: String,
    pub body: String,
    pub categories: String,
    pub name: String,
    pub email: String,
    /// Honeypot. Humans never see it.
    pub phone_number: String,
}

/// ResponseForm
///
/// Urlencoded body of `POST /thread/<id>/<slug>/`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct ResponseForm {
    pub body: String,
    pub name: String,
    pub email: String,
    /// Honeypot. Humans never see it.
    pub phone_number: String,
}

/// QuestionFormState
///
/// A question form as handed to the template: current values plus errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct QuestionFormState {
    pub title: String,
    pub body: String,
    pub categories: String,
    pub name: String,
    pub email: String,
    /// Anonymous submitters must identify themselves with name and email.
    pub ask_identity: bool,
    pub errors: FieldErrors,
}

/// ResponseFormState
///
/// A response form bound to its question.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct ResponseFormState {
    pub question_id: i64,
    pub body: String,
    pub name: String,
    pub email: String,
    pub ask_identity: bool,
    pub errors: FieldErrors,
}

/// An anonymous submission that filled in the honeypot. Silently discarded.
pub fn is_spam(viewer: &Viewer, phone_number: &str) -> bool {
    !viewer.is_authenticated() && !phone_number.trim().is_empty()
}

/// Whether the viewer is offered a question form at all.
pub fn question_form_available(viewer: &Viewer, settings: &KnowledgeSettings) -> bool {
    viewer.is_authenticated() || settings.allow_anonymous
}

/// Whether the viewer may respond to `question`: never on a locked thread, never
/// anonymously unless allowed, and only staff or the owner when responses are not free.
pub fn response_form_available(
    viewer: &Viewer,
    question: &Question,
    settings: &KnowledgeSettings,
) -> bool {
    if question.locked || !question_form_available(viewer, settings) {
        return false;
    }
    settings.free_response
        || viewer.is_staff()
        || (viewer.user_id().is_some() && viewer.user_id() == question.user_id)
}

impl QuestionForm {
    /// clean
    ///
    /// Validates the submission and builds the row to insert. `known` is the full
    /// category list; every selected id must appear in it.
    pub fn clean(
        &self,
        viewer: &Viewer,
        known: &[Category],
        settings: &KnowledgeSettings,
    ) -> Result<NewQuestion, FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = self.title.trim();
        if title.is_empty() {
            add_error(&mut errors, "title", "This field is required.");
        } else if title.chars().count() > TITLE_MAX_LEN {
            add_error(
                &mut errors,
                "title",
                &format!("Ensure this value has at most {} characters.", TITLE_MAX_LEN),
            );
        }

        let mut category_ids = Vec::new();
        for raw in self.categories.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match raw.parse::<i64>() {
                Ok(id) if known.iter().any(|c| c.id == id) => {
                    if !category_ids.contains(&id) {
                        category_ids.push(id);
                    }
                }
                _ => add_error(
                    &mut errors,
                    "categories",
                    &format!("Select a valid choice. {} is not one of the available choices.", raw),
                ),
            }
        }

        let (name, email) = clean_identity(viewer, &self.name, &self.email, &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        let status = if settings.auto_publicize {
            Status::Public
        } else {
            Status::Private
        };

        Ok(NewQuestion {
            user_id: viewer.user_id(),
            name,
            email,
            title: title.to_string(),
            body: self.body.trim().to_string(),
            status,
            category_ids,
        })
    }
}

impl ResponseForm {
    /// clean
    ///
    /// Validates the submission against `question`. New responses inherit the
    /// question's visibility.
    pub fn clean(&self, viewer: &Viewer, question: &Question) -> Result<NewResponse, FieldErrors> {
        let mut errors = FieldErrors::new();

        let body = self.body.trim();
        if body.is_empty() {
            add_error(&mut errors, "body", "This field is required.");
        }

        let (name, email) = clean_identity(viewer, &self.name, &self.email, &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        let phone_number = Some(self.phone_number.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Ok(NewResponse {
            question_id: question.id,
            user_id: viewer.user_id(),
            name,
            email,
            body: body.to_string(),
            status: Status::Inherit,
            phone_number,
        })
    }
}

impl QuestionFormState {
    pub fn blank(viewer: &Viewer) -> Self {
        Self {
            ask_identity: !viewer.is_authenticated(),
            ..Self::default()
        }
    }

    /// Empty form with the title already filled in (search box on the list page).
    pub fn prefilled(viewer: &Viewer, title: Option<&str>) -> Self {
        Self {
            title: title.unwrap_or_default().to_string(),
            ..Self::blank(viewer)
        }
    }

    pub fn bound(viewer: &Viewer, form: &QuestionForm, errors: FieldErrors) -> Self {
        Self {
            title: form.title.clone(),
            body: form.body.clone(),
            categories: form.categories.clone(),
            name: form.name.clone(),
            email: form.email.clone(),
            ask_identity: !viewer.is_authenticated(),
            errors,
        }
    }
}

impl ResponseFormState {
    pub fn blank(viewer: &Viewer, question: &Question) -> Self {
        Self {
            question_id: question.id,
            ask_identity: !viewer.is_authenticated(),
            ..Self::default()
        }
    }

    pub fn bound(viewer: &Viewer, question: &Question, form: &ResponseForm, errors: FieldErrors) -> Self {
        Self {
            question_id: question.id,
            body: form.body.clone(),
            name: form.name.clone(),
            email: form.email.clone(),
            ask_identity: !viewer.is_authenticated(),
            errors,
        }
    }
}

/// Anonymous submitters must leave a name and a plausible email; members are
/// identified by their account and the fields are ignored.
fn clean_identity(
    viewer: &Viewer,
    name: &str,
    email: &str,
    errors: &mut FieldErrors,
) -> (Option<String>, Option<String>) {
    if viewer.is_authenticated() {
        return (None, None);
    }

    let name = name.trim();
    let email = email.trim();
    if name.is_empty() {
        add_error(errors, "name", "This field is required.");
    }
    if email.is_empty() {
        add_error(errors, "email", "This field is required.");
    } else if !looks_like_email(email) {
        add_error(errors, "email", "Enter a valid email address.");
    }
    (Some(name.to_string()), Some(email.to_string()))
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn add_error(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}
