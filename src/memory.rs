use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::auth::Viewer;
use crate::models::{Author, Category, Company, NewQuestion, NewResponse, Question, Response, Status, User};
use crate::repository::{QuestionFilter, QuestionOrder, RepoResult, Repository, Slice};

/// InMemoryRepository
///
/// A `Repository` kept entirely in process memory. Used by the test suites and for
/// running the server without Postgres. It applies the same visibility predicates
/// as the SQL store, only over loaded rows.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

#[derive(Default)]
struct Store {
    users: Vec<User>,
    authors: Vec<Author>,
    companies: Vec<Company>,
    categories: Vec<Category>,
    questions: Vec<Question>,
    // (question id, category id)
    question_categories: Vec<(i64, i64)>,
    responses: Vec<Response>,
    next_id: i64,
    // Monotonic clock so insertion order is also `added` order.
    ticks: i64,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn now(&mut self) -> chrono::DateTime<Utc> {
        self.ticks += 1;
        Utc::now() + Duration::milliseconds(self.ticks)
    }

    fn question(&self, id: i64) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    fn question_mut(&mut self, id: i64) -> Option<&mut Question> {
        self.questions.iter_mut().find(|q| q.id == id)
    }

    fn category_ids_of(&self, question_id: i64) -> Vec<i64> {
        self.question_categories
            .iter()
            .filter(|(qid, _)| *qid == question_id)
            .map(|(_, cid)| *cid)
            .collect()
    }

    fn matches(&self, question: &Question, filter: &QuestionFilter) -> bool {
        if let Some(term) = filter.search_term() {
            let term = term.to_lowercase();
            if !question.title.to_lowercase().contains(&term)
                && !question.body.to_lowercase().contains(&term)
            {
                return false;
            }
        }
        if let Some(category_id) = filter.category_id {
            if !self.category_ids_of(question.id).contains(&category_id) {
                return false;
            }
        }
        if filter.owner.is_some() && question.user_id != filter.owner {
            return false;
        }
        !filter.recommended_only || question.recommended
    }

    fn visible_questions(&self, viewer: &Viewer, filter: &QuestionFilter) -> Vec<Question> {
        let mut found: Vec<Question> = self
            .questions
            .iter()
            .filter(|q| viewer.can_view_question(q) && self.matches(q, filter))
            .cloned()
            .collect();

        match filter.order {
            QuestionOrder::Newest => found.sort_by(|a, b| (b.added, b.id).cmp(&(a.added, a.id))),
            QuestionOrder::MostHits => found.sort_by(|a, b| (b.hits, b.id).cmp(&(a.hits, a.id))),
            QuestionOrder::RecentlyChanged => {
                found.sort_by(|a, b| (b.lastchanged, b.id).cmp(&(a.lastchanged, a.id)))
            }
        }
        found
    }

    fn response_visible(&self, viewer: &Viewer, response: &Response) -> bool {
        self.question(response.question_id)
            .is_some_and(|question| viewer.can_view_response(response, question))
    }

    fn insert_question(&mut self, new: NewQuestion) -> Question {
        let id = self.next_id();
        let now = self.now();
        let question = Question {
            id,
            user_id: new.user_id,
            name: new.name,
            email: new.email,
            title: new.title,
            body: new.body,
            status: new.status,
            locked: false,
            recommended: false,
            hits: 0,
            added: now,
            lastchanged: now,
        };
        for category_id in new.category_ids {
            if self.categories.iter().any(|c| c.id == category_id) {
                self.question_categories.push((id, category_id));
            }
        }
        self.questions.push(question.clone());
        question
    }

    fn insert_response(&mut self, new: NewResponse) -> Response {
        let id = self.next_id();
        let now = self.now();
        let response = Response {
            id,
            question_id: new.question_id,
            user_id: new.user_id,
            name: new.name,
            email: new.email,
            body: new.body,
            status: new.status,
            accepted: false,
            phone_number: new.phone_number,
            added: now,
            lastchanged: now,
        };
        self.responses.push(response.clone());
        response
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Seeding ---

    pub fn add_user(&self, user: User) {
        self.lock().users.push(user);
    }

    pub fn add_author(&self, author: Author) {
        self.lock().authors.push(author);
    }

    pub fn add_company(&self, name: &str, website: Option<&str>) -> Company {
        let mut store = self.lock();
        let company = Company {
            id: store.next_id(),
            name: name.to_string(),
            website: website.map(str::to_string),
        };
        store.companies.push(company.clone());
        company
    }

    pub fn add_category(&self, title: &str, slug: &str) -> Category {
        let mut store = self.lock();
        let category = Category {
            id: store.next_id(),
            title: title.to_string(),
            slug: slug.to_string(),
        };
        store.categories.push(category.clone());
        category
    }

    pub fn add_question(&self, new: NewQuestion) -> Question {
        self.lock().insert_question(new)
    }

    pub fn add_response(&self, new: NewResponse) -> Response {
        self.lock().insert_response(new)
    }

    /// Edits a stored question in place, e.g. to mark it recommended.
    pub fn update_question(&self, id: i64, edit: impl FnOnce(&mut Question)) {
        if let Some(question) = self.lock().question_mut(id) {
            edit(question);
        }
    }

    // --- Inspection ---

    pub fn question(&self, id: i64) -> Option<Question> {
        self.lock().question(id).cloned()
    }

    pub fn response(&self, id: i64) -> Option<Response> {
        self.lock().responses.iter().find(|r| r.id == id).cloned()
    }

    pub fn question_count(&self) -> usize {
        self.lock().questions.len()
    }

    pub fn response_count(&self) -> usize {
        self.lock().responses.len()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_author(&self, user_id: Uuid) -> RepoResult<Option<Author>> {
        Ok(self.lock().authors.iter().find(|a| a.user_id == user_id).cloned())
    }

    async fn get_company_by_name(&self, name: &str) -> RepoResult<Option<Company>> {
        Ok(self.lock().companies.iter().find(|c| c.name == name).cloned())
    }

    async fn get_categories(&self) -> RepoResult<Vec<Category>> {
        let mut categories = self.lock().categories.clone();
        categories.sort_by(|a, b| (&a.title, a.id).cmp(&(&b.title, b.id)));
        Ok(categories)
    }

    async fn get_category_by_slug(&self, slug: &str) -> RepoResult<Option<Category>> {
        Ok(self.lock().categories.iter().find(|c| c.slug == slug).cloned())
    }

    async fn get_question_categories(&self, question_ids: &[i64]) -> RepoResult<Vec<(i64, Category)>> {
        let store = self.lock();
        let mut pairs: Vec<(i64, Category)> = store
            .question_categories
            .iter()
            .filter(|(qid, _)| question_ids.contains(qid))
            .filter_map(|(qid, cid)| {
                store
                    .categories
                    .iter()
                    .find(|c| c.id == *cid)
                    .map(|c| (*qid, c.clone()))
            })
            .collect();
        pairs.sort_by(|a, b| (&a.1.title, a.1.id).cmp(&(&b.1.title, b.1.id)));
        Ok(pairs)
    }

    async fn count_questions(&self, viewer: &Viewer, filter: &QuestionFilter) -> RepoResult<i64> {
        let count = self.lock().visible_questions(viewer, filter).len();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn list_questions(
        &self,
        viewer: &Viewer,
        filter: &QuestionFilter,
        slice: Option<Slice>,
    ) -> RepoResult<Vec<Question>> {
        let found = self.lock().visible_questions(viewer, filter);
        Ok(match slice {
            Some(slice) => found
                .into_iter()
                .skip(usize::try_from(slice.offset).unwrap_or(0))
                .take(usize::try_from(slice.limit).unwrap_or(0))
                .collect(),
            None => found,
        })
    }

    async fn get_visible_question(&self, viewer: &Viewer, id: i64) -> RepoResult<Option<Question>> {
        Ok(self
            .lock()
            .question(id)
            .filter(|q| viewer.can_view_question(q))
            .cloned())
    }

    async fn get_question(&self, id: i64) -> RepoResult<Option<Question>> {
        Ok(self.question(id))
    }

    async fn increment_hits(&self, id: i64) -> RepoResult<i64> {
        let mut store = self.lock();
        let question = store.question_mut(id).ok_or(sqlx::Error::RowNotFound)?;
        question.hits += 1;
        Ok(question.hits)
    }

    async fn create_question(&self, new: NewQuestion) -> RepoResult<Question> {
        Ok(self.add_question(new))
    }

    async fn list_responses(&self, viewer: &Viewer, question_ids: &[i64]) -> RepoResult<Vec<Response>> {
        let store = self.lock();
        let mut found: Vec<Response> = store
            .responses
            .iter()
            .filter(|r| question_ids.contains(&r.question_id) && store.response_visible(viewer, r))
            .cloned()
            .collect();
        found.sort_by(|a, b| (a.added, a.id).cmp(&(b.added, b.id)));
        Ok(found)
    }

    async fn get_visible_response(&self, viewer: &Viewer, id: i64) -> RepoResult<Option<Response>> {
        let store = self.lock();
        Ok(store
            .responses
            .iter()
            .find(|r| r.id == id)
            .filter(|r| store.response_visible(viewer, r))
            .cloned())
    }

    async fn create_response(&self, new: NewResponse) -> RepoResult<Response> {
        let mut store = self.lock();
        if store.question(new.question_id).is_none() {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(store.insert_response(new))
    }

    async fn set_question_status(&self, id: i64, status: Status) -> RepoResult<()> {
        let mut store = self.lock();
        let now = store.now();
        if let Some(question) = store.question_mut(id) {
            question.status = status;
            question.lastchanged = now;
        }
        Ok(())
    }

    async fn toggle_question_lock(&self, id: i64) -> RepoResult<()> {
        let mut store = self.lock();
        let now = store.now();
        if let Some(question) = store.question_mut(id) {
            question.locked = !question.locked;
            question.lastchanged = now;
        }
        Ok(())
    }

    async fn delete_question(&self, id: i64) -> RepoResult<()> {
        let mut store = self.lock();
        store.questions.retain(|q| q.id != id);
        store.responses.retain(|r| r.question_id != id);
        store.question_categories.retain(|(qid, _)| *qid != id);
        Ok(())
    }

    async fn clear_accepted(&self, question_id: i64) -> RepoResult<()> {
        for response in self
            .lock()
            .responses
            .iter_mut()
            .filter(|r| r.question_id == question_id)
        {
            response.accepted = false;
        }
        Ok(())
    }

    async fn set_response_status(&self, id: i64, status: Status) -> RepoResult<()> {
        let mut store = self.lock();
        let now = store.now();
        if let Some(response) = store.responses.iter_mut().find(|r| r.id == id) {
            response.status = status;
            response.lastchanged = now;
        }
        Ok(())
    }

    async fn delete_response(&self, id: i64) -> RepoResult<()> {
        self.lock().responses.retain(|r| r.id != id);
        Ok(())
    }

    async fn accept_response(&self, id: i64) -> RepoResult<()> {
        let mut store = self.lock();
        let Some(question_id) = store.responses.iter().find(|r| r.id == id).map(|r| r.question_id) else {
            return Ok(());
        };
        for response in store.responses.iter_mut().filter(|r| r.question_id == question_id) {
            response.accepted = response.id == id;
        }
        Ok(())
    }
}
