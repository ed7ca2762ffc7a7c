//! Listing Service: paginated, filtered question pages.

use std::collections::HashMap;

use crate::auth::Viewer;
use crate::models::{Category, ListedQuestion, Question, QuestionPage, Response};
use crate::pagination::{PER_PAGE, Paginator};
use crate::repository::{QuestionFilter, RepoResult, Repository, Slice};

/// The index page only ever pages through the first twenty questions.
pub const INDEX_LIMIT: i64 = 20;

/// paginate_questions
///
/// Counts the visible questions matching `filter` (capped at `cap` when given),
/// resolves `raw_page` against that count and loads just that page, each question
/// carrying its categories and the responses `viewer` may see.
pub async fn paginate_questions(
    repo: &dyn Repository,
    viewer: &Viewer,
    filter: &QuestionFilter,
    cap: Option<i64>,
    raw_page: Option<&str>,
) -> RepoResult<QuestionPage> {
    let mut count = repo.count_questions(viewer, filter).await?;
    if let Some(cap) = cap {
        count = count.min(cap);
    }

    let window = Paginator::new(count, PER_PAGE).page(raw_page);
    let questions = if window.limit > 0 {
        let slice = Slice {
            offset: window.offset,
            limit: window.limit,
        };
        repo.list_questions(viewer, filter, Some(slice)).await?
    } else {
        vec![]
    };

    Ok(QuestionPage {
        items: annotate(repo, viewer, questions).await?,
        number: window.number,
        num_pages: window.num_pages,
        count: window.count,
        has_next: window.has_next(),
        has_previous: window.has_previous(),
    })
}

/// annotate
///
/// Pairs each question with its categories and its visible responses, using one
/// query for each rather than one per question.
pub async fn annotate(
    repo: &dyn Repository,
    viewer: &Viewer,
    questions: Vec<Question>,
) -> RepoResult<Vec<ListedQuestion>> {
    if questions.is_empty() {
        return Ok(vec![]);
    }
    let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();

    let mut categories: HashMap<i64, Vec<Category>> = HashMap::new();
    for (question_id, category) in repo.get_question_categories(&ids).await? {
        categories.entry(question_id).or_default().push(category);
    }

    let mut responses: HashMap<i64, Vec<Response>> = HashMap::new();
    for response in repo.list_responses(viewer, &ids).await? {
        responses.entry(response.question_id).or_default().push(response);
    }

    Ok(questions
        .into_iter()
        .map(|question| ListedQuestion {
            categories: categories.remove(&question.id).unwrap_or_default(),
            responses: responses.remove(&question.id).unwrap_or_default(),
            question,
        })
        .collect())
}

/// my_questions
///
/// The viewer's own visible questions, newest first. `None` for anonymous viewers.
pub async fn my_questions(repo: &dyn Repository, viewer: &Viewer) -> RepoResult<Option<Vec<Question>>> {
    match viewer.user_id() {
        Some(user_id) => {
            let filter = QuestionFilter::owned_by(user_id);
            Ok(Some(repo.list_questions(viewer, &filter, None).await?))
        }
        None => Ok(None),
    }
}
