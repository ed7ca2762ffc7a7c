//! Thread Service: one question with its responses.

use axum::response::Response as HttpResponse;
use uuid::Uuid;

use crate::auth::Viewer;
use crate::config::KnowledgeSettings;
use crate::error::AppError;
use crate::models::{Author, Category, Company, Question, Response};
use crate::repository::{RepoResult, Repository};
use crate::urls;

/// Thread
///
/// Everything the thread page shows about the question itself.
#[derive(Debug, Clone)]
pub struct Thread {
    pub question: Question,
    pub categories: Vec<Category>,
    pub responses: Vec<Response>,
    /// Profile of the question's author.
    pub author_instance: Option<Author>,
    /// That profile's company.
    pub company: Option<Company>,
}

/// Opened
///
/// Either the thread to render, or a redirect to send instead.
pub enum Opened {
    Thread(Box<Thread>),
    Redirect(HttpResponse),
}

/// open_thread
///
/// 1. Look the question up through the visibility filter. An invisible question
///    that exists goes to `login_redirect_url` when configured; otherwise 404.
/// 2. Resolve the author's profile and company (either may be absent).
/// 3. Count the view.
/// 4. Permanently redirect when `request_path` is not the canonical address.
pub async fn open_thread(
    repo: &dyn Repository,
    viewer: &Viewer,
    settings: &KnowledgeSettings,
    question_id: i64,
    request_path: &str,
) -> Result<Opened, AppError> {
    let Some(mut question) = repo.get_visible_question(viewer, question_id).await? else {
        let exists = repo.get_question(question_id).await?.is_some();
        return match (&settings.login_redirect_url, exists) {
            (Some(target), true) => Ok(Opened::Redirect(urls::found(target))),
            _ => Err(AppError::NotFound),
        };
    };

    let (author_instance, company) = author_and_company(repo, question.user_id).await?;

    question.hits = repo.increment_hits(question.id).await?;
    tracing::debug!(question_id = question.id, hits = question.hits, "thread viewed");

    let canonical = question.canonical_url();
    if request_path != canonical {
        return Ok(Opened::Redirect(urls::moved_permanently(&canonical)));
    }

    let categories = repo
        .get_question_categories(&[question.id])
        .await?
        .into_iter()
        .map(|(_, category)| category)
        .collect();
    let responses = repo.list_responses(viewer, &[question.id]).await?;

    Ok(Opened::Thread(Box::new(Thread {
        question,
        categories,
        responses,
        author_instance,
        company,
    })))
}

/// author_and_company
///
/// The profile of `user_id` and the company it names. Anonymous owners, missing
/// profiles, profiles without a company and unknown company names all resolve to
/// `None`; only store failures are errors.
pub async fn author_and_company(
    repo: &dyn Repository,
    user_id: Option<Uuid>,
) -> RepoResult<(Option<Author>, Option<Company>)> {
    let Some(user_id) = user_id else {
        return Ok((None, None));
    };
    let Some(author) = repo.get_author(user_id).await? else {
        return Ok((None, None));
    };
    let company = match author.company.as_deref() {
        Some(name) => repo.get_company_by_name(name).await?,
        None => None,
    };
    Ok((Some(author), company))
}

/// The requesting user's own profile, if they have one.
pub async fn viewer_author(repo: &dyn Repository, viewer: &Viewer) -> RepoResult<Option<Author>> {
    match viewer.user_id() {
        Some(user_id) => repo.get_author(user_id).await,
        None => Ok(None),
    }
}
