use crate::{
    AppState,
    auth::Viewer,
    error::AppError,
    forms::{
        self, QuestionForm, QuestionFormState, ResponseForm, ResponseFormState,
    },
    listing::{self, INDEX_LIMIT},
    models::{AskPage, IndexPage, ListPage, ThreadPage},
    moderation::{self, EntityKind, Moderation},
    repository::{QuestionFilter, QuestionOrder, RepoResult},
    thread::{self, Opened, Thread},
    urls,
};
use axum::{
    Form, Json,
    extract::{OriginalUri, Path, Query, State},
    http::Method,
    response::{IntoResponse, Response as HttpResponse},
};
use serde::Deserialize;

pub const INDEX_TEMPLATE: &str = "knowledge/index.html";
pub const LIST_TEMPLATE: &str = "knowledge/list.html";
pub const THREAD_TEMPLATE: &str = "knowledge/thread.html";
pub const ASK_TEMPLATE: &str = "knowledge/ask.html";

// --- Query & Path Structs ---

/// IndexQuery
///
/// Page numbers of the three index listings. Kept as raw strings: a value that is
/// not an integer means page 1, not a rejected request.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IndexQuery {
    pub page: Option<String>,
    pub popular_page: Option<String>,
    pub recommended_page: Option<String>,
}

/// ListQuery
///
/// `title` searches titles and bodies; `page` selects the page.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    pub title: Option<String>,
    pub page: Option<String>,
}

/// ThreadPath
///
/// Only the id matters; the slug is checked against the canonical URL as a whole.
/// The id stays raw so that a malformed one is a 404 like any unknown id.
#[derive(Debug, Deserialize)]
pub struct ThreadPath {
    pub question_id: String,
}

impl ThreadPath {
    pub fn question_id(&self) -> Result<i64, AppError> {
        self.question_id.parse().map_err(|_| AppError::NotFound)
    }
}

// --- Index & Listing ---

/// knowledge_index
///
/// The newest twenty visible questions, the most viewed ones, and the
/// recommended ones when any of them is visible.
#[utoipa::path(
    get,
    path = "/",
    params(IndexQuery),
    responses(
        (status = 200, description = "Index page context", body = IndexPage),
        (status = 302, description = "Login required")
    )
)]
pub async fn knowledge_index(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<IndexQuery>,
) -> Result<Json<IndexPage>, AppError> {
    let repo = state.repo.as_ref();

    let questions = listing::paginate_questions(
        repo,
        &viewer,
        &QuestionFilter::default(),
        Some(INDEX_LIMIT),
        query.page.as_deref(),
    )
    .await?;

    let popular = listing::paginate_questions(
        repo,
        &viewer,
        &QuestionFilter::ordered(QuestionOrder::MostHits),
        None,
        query.popular_page.as_deref(),
    )
    .await?;

    let recommended_filter = QuestionFilter {
        recommended_only: true,
        ..QuestionFilter::ordered(QuestionOrder::RecentlyChanged)
    };
    let recommended = if repo.count_questions(&viewer, &recommended_filter).await? > 0 {
        Some(
            listing::paginate_questions(
                repo,
                &viewer,
                &recommended_filter,
                None,
                query.recommended_page.as_deref(),
            )
            .await?,
        )
    } else {
        None
    };

    Ok(Json(IndexPage {
        template: INDEX_TEMPLATE.to_string(),
        base_template: state.config.knowledge.base_template.clone(),
        author: thread::viewer_author(repo, &viewer).await?,
        questions,
        popular,
        recommended,
        my_questions: listing::my_questions(repo, &viewer).await?,
        categories: repo.get_categories().await?,
    }))
}

/// knowledge_list
///
/// Every visible question, optionally searched.
#[utoipa::path(
    get,
    path = "/list/",
    params(ListQuery),
    responses((status = 200, description = "List page context", body = ListPage))
)]
pub async fn knowledge_list(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListPage>, AppError> {
    render_list(&state, &viewer, None, query).await.map(Json)
}

/// knowledge_list_category
///
/// Visible questions of one category, optionally searched. Unknown slugs are 404.
#[utoipa::path(
    get,
    path = "/list/{category_slug}/",
    params(
        ("category_slug" = String, Path, description = "Category slug"),
        ListQuery
    ),
    responses(
        (status = 200, description = "List page context", body = ListPage),
        (status = 404, description = "Unknown category")
    )
)]
pub async fn knowledge_list_category(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(category_slug): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListPage>, AppError> {
    render_list(&state, &viewer, Some(category_slug), query).await.map(Json)
}

async fn render_list(
    state: &AppState,
    viewer: &Viewer,
    category_slug: Option<String>,
    query: ListQuery,
) -> Result<ListPage, AppError> {
    let repo = state.repo.as_ref();

    let category = match category_slug {
        Some(slug) => Some(
            repo.get_category_by_slug(&slug)
                .await?
                .ok_or(AppError::NotFound)?,
        ),
        None => None,
    };

    let filter = QuestionFilter {
        search: query.title.clone(),
        category_id: category.as_ref().map(|c| c.id),
        ..QuestionFilter::default()
    };
    let questions =
        listing::paginate_questions(repo, viewer, &filter, None, query.page.as_deref()).await?;

    let form = forms::question_form_available(viewer, &state.config.knowledge)
        .then(|| QuestionFormState::prefilled(viewer, query.title.as_deref()));

    Ok(ListPage {
        template: LIST_TEMPLATE.to_string(),
        base_template: state.config.knowledge.base_template.clone(),
        search: query.title,
        category,
        questions,
        author: thread::viewer_author(repo, viewer).await?,
        my_questions: listing::my_questions(repo, viewer).await?,
        categories: repo.get_categories().await?,
        form,
    })
}

// --- Thread ---

/// show_thread
///
/// Renders a question with its visible responses and, when the viewer may
/// respond, an empty response form. Every successful lookup counts a hit.
#[utoipa::path(
    get,
    path = "/thread/{question_id}/{slug}/",
    params(
        ("question_id" = i64, Path, description = "Question id"),
        ("slug" = String, Path, description = "Slug of the question title")
    ),
    responses(
        (status = 200, description = "Thread page context", body = ThreadPage),
        (status = 301, description = "Redirect to the canonical thread URL"),
        (status = 302, description = "Invisible question, sent to the login redirect"),
        (status = 404, description = "Not found")
    )
)]
pub async fn show_thread(
    State(state): State<AppState>,
    viewer: Viewer,
    OriginalUri(uri): OriginalUri,
    Path(path): Path<ThreadPath>,
) -> Result<HttpResponse, AppError> {
    let repo = state.repo.as_ref();
    let settings = &state.config.knowledge;

    let thread = match thread::open_thread(repo, &viewer, settings, path.question_id()?, uri.path()).await? {
        Opened::Thread(thread) => *thread,
        Opened::Redirect(redirect) => return Ok(redirect),
    };

    let form = forms::response_form_available(&viewer, &thread.question, settings)
        .then(|| ResponseFormState::blank(&viewer, &thread.question));
    let page = thread_page(&state, &viewer, thread, form).await?;
    Ok(Json(page).into_response())
}

/// reply_to_thread
///
/// Validates and stores a response, then sends the caller back to the thread.
/// Anonymous submissions with the honeypot filled in are dropped but redirected
/// exactly like a stored one.
#[utoipa::path(
    post,
    path = "/thread/{question_id}/{slug}/",
    params(
        ("question_id" = i64, Path, description = "Question id"),
        ("slug" = String, Path, description = "Slug of the question title")
    ),
    request_body(content = ResponseForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Response stored (or discarded as spam)"),
        (status = 200, description = "Form errors, or no form available", body = ThreadPage),
        (status = 301, description = "Redirect to the canonical thread URL"),
        (status = 404, description = "Not found")
    )
)]
pub async fn reply_to_thread(
    State(state): State<AppState>,
    viewer: Viewer,
    OriginalUri(uri): OriginalUri,
    Path(path): Path<ThreadPath>,
    Form(form): Form<ResponseForm>,
) -> Result<HttpResponse, AppError> {
    let repo = state.repo.as_ref();
    let settings = &state.config.knowledge;

    let thread = match thread::open_thread(repo, &viewer, settings, path.question_id()?, uri.path()).await? {
        Opened::Thread(thread) => *thread,
        Opened::Redirect(redirect) => return Ok(redirect),
    };

    if !forms::response_form_available(&viewer, &thread.question, settings) {
        let page = thread_page(&state, &viewer, thread, None).await?;
        return Ok(Json(page).into_response());
    }

    match form.clean(&viewer, &thread.question) {
        Ok(new_response) => {
            let canonical = thread.question.canonical_url();
            if forms::is_spam(&viewer, &form.phone_number) {
                tracing::info!(question_id = thread.question.id, "discarded anonymous response");
            } else {
                let response = repo.create_response(new_response).await?;
                tracing::info!(
                    question_id = thread.question.id,
                    response_id = response.id,
                    "response created"
                );
            }
            Ok(urls::found(&canonical))
        }
        Err(errors) => {
            let bound = ResponseFormState::bound(&viewer, &thread.question, &form, errors);
            let page = thread_page(&state, &viewer, thread, Some(bound)).await?;
            Ok(Json(page).into_response())
        }
    }
}

async fn thread_page(
    state: &AppState,
    viewer: &Viewer,
    thread: Thread,
    form: Option<ResponseFormState>,
) -> RepoResult<ThreadPage> {
    let repo = state.repo.as_ref();
    Ok(ThreadPage {
        template: THREAD_TEMPLATE.to_string(),
        base_template: state.config.knowledge.base_template.clone(),
        question: thread.question,
        question_categories: thread.categories,
        company: thread.company,
        author: thread::viewer_author(repo, viewer).await?,
        author_instance: thread.author_instance,
        responses: thread.responses,
        allowed_mods: moderation::allowed_mods(),
        form,
        my_questions: listing::my_questions(repo, viewer).await?,
        categories: repo.get_categories().await?,
    })
}

// --- Moderation ---

/// knowledge_moderate
///
/// Applies one named transition to a question or response and redirects to the
/// affected thread. A wrong method, unknown model, missing permission, action
/// outside the model's allow-list, malformed id or invisible target all produce
/// the same 404.
#[utoipa::path(
    post,
    path = "/moderate/{model}/{lookup_id}/{mod}/",
    params(
        ("model" = String, Path, description = "question | response"),
        ("lookup_id" = i64, Path, description = "Entity id"),
        ("mod" = String, Path, description = "Action from the model's allow-list")
    ),
    responses(
        (status = 302, description = "Applied; redirect to the thread (or the index after a delete)"),
        (status = 404, description = "Not found")
    )
)]
pub async fn knowledge_moderate(
    State(state): State<AppState>,
    method: Method,
    viewer: Viewer,
    Path((model, lookup_id, action)): Path<(String, String, String)>,
) -> Result<HttpResponse, AppError> {
    if method != Method::POST {
        return Err(AppError::NotFound);
    }

    let kind = EntityKind::parse(&model).ok_or(AppError::NotFound)?;
    if !viewer.has_perm(kind.required_permission()) {
        return Err(AppError::NotFound);
    }

    let id: i64 = lookup_id.parse().map_err(|_| AppError::NotFound)?;
    let request = Moderation::new(kind, id, &action).ok_or(AppError::NotFound)?;

    match moderation::apply(state.repo.as_ref(), &viewer, request).await? {
        Some(location) => Ok(urls::found(&location)),
        None => Err(AppError::NotFound),
    }
}

// --- Ask ---

/// show_ask
///
/// An empty question form, or none when anonymous questions are disabled.
#[utoipa::path(
    get,
    path = "/ask/",
    responses((status = 200, description = "Ask page context", body = AskPage))
)]
pub async fn show_ask(State(state): State<AppState>, viewer: Viewer) -> Result<Json<AskPage>, AppError> {
    let form = forms::question_form_available(&viewer, &state.config.knowledge)
        .then(|| QuestionFormState::blank(&viewer));
    Ok(Json(ask_page(&state, &viewer, form).await?))
}

/// submit_question
///
/// Stores a new question and redirects to its thread. Anonymous spam (honeypot
/// filled in) is dropped and redirected to the index instead.
#[utoipa::path(
    post,
    path = "/ask/",
    request_body(content = QuestionForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Question stored; redirect to its thread"),
        (status = 200, description = "Form errors, or no form available", body = AskPage)
    )
)]
pub async fn submit_question(
    State(state): State<AppState>,
    viewer: Viewer,
    Form(form): Form<QuestionForm>,
) -> Result<HttpResponse, AppError> {
    let repo = state.repo.as_ref();
    let settings = &state.config.knowledge;

    if !forms::question_form_available(&viewer, settings) {
        return Ok(Json(ask_page(&state, &viewer, None).await?).into_response());
    }

    let categories = repo.get_categories().await?;
    match form.clean(&viewer, &categories, settings) {
        Ok(new_question) => {
            if forms::is_spam(&viewer, &form.phone_number) {
                tracing::info!("discarded anonymous question");
                return Ok(urls::found(urls::INDEX_PATH));
            }
            let question = repo.create_question(new_question).await?;
            tracing::info!(question_id = question.id, "question created");
            Ok(urls::found(&question.canonical_url()))
        }
        Err(errors) => {
            let bound = QuestionFormState::bound(&viewer, &form, errors);
            Ok(Json(ask_page(&state, &viewer, Some(bound)).await?).into_response())
        }
    }
}

async fn ask_page(
    state: &AppState,
    viewer: &Viewer,
    form: Option<QuestionFormState>,
) -> RepoResult<AskPage> {
    let repo = state.repo.as_ref();
    Ok(AskPage {
        template: ASK_TEMPLATE.to_string(),
        base_template: state.config.knowledge.base_template.clone(),
        form,
        my_questions: listing::my_questions(repo, viewer).await?,
        categories: repo.get_categories().await?,
    })
}
