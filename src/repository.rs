use crate::auth::Viewer;
use crate::models::{Author, Category, Company, NewQuestion, NewResponse, Question, Response, Status, User};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, sqlx::Error>;

/// QuestionOrder
///
/// The orderings the listings need. Ties always break on id, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuestionOrder {
    /// Default listing order: most recently added first.
    #[default]
    Newest,
    /// Popular: highest hit count first.
    MostHits,
    /// Recommended: most recently changed first.
    RecentlyChanged,
}

/// QuestionFilter
///
/// Narrowing applied on top of the visibility predicate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionFilter {
    /// Case-insensitive substring of the title OR the body. Empty means no search.
    pub search: Option<String>,
    pub category_id: Option<i64>,
    pub owner: Option<Uuid>,
    pub recommended_only: bool,
    pub order: QuestionOrder,
}

impl QuestionFilter {
    pub fn ordered(order: QuestionOrder) -> Self {
        Self {
            order,
            ..Self::default()
        }
    }

    pub fn owned_by(owner: Uuid) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    /// The search term, if it is worth searching for.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }
}

/// Slice
///
/// `LIMIT`/`OFFSET` window over an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub offset: i64,
    pub limit: i64,
}

/// Repository Trait
///
/// Every persistence operation the knowledge base performs. Handlers and services
/// only ever see `Arc<dyn Repository>`, so the Postgres store and the in-memory
/// store are interchangeable. Every query that returns questions or responses to a
/// user takes the `Viewer` and applies the visibility predicate in the store.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users & Profiles ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_author(&self, user_id: Uuid) -> RepoResult<Option<Author>>;
    async fn get_company_by_name(&self, name: &str) -> RepoResult<Option<Company>>;

    // --- Categories ---
    async fn get_categories(&self) -> RepoResult<Vec<Category>>;
    async fn get_category_by_slug(&self, slug: &str) -> RepoResult<Option<Category>>;
    // Pairs of (question id, category) for every listed question.
    async fn get_question_categories(&self, question_ids: &[i64]) -> RepoResult<Vec<(i64, Category)>>;

    // --- Questions ---
    async fn count_questions(&self, viewer: &Viewer, filter: &QuestionFilter) -> RepoResult<i64>;
    async fn list_questions(
        &self,
        viewer: &Viewer,
        filter: &QuestionFilter,
        slice: Option<Slice>,
    ) -> RepoResult<Vec<Question>>;
    async fn get_visible_question(&self, viewer: &Viewer, id: i64) -> RepoResult<Option<Question>>;
    // No visibility check: existence checks and redirect targets only.
    async fn get_question(&self, id: i64) -> RepoResult<Option<Question>>;
    // Atomic `hits = hits + 1`; returns the new count.
    async fn increment_hits(&self, id: i64) -> RepoResult<i64>;
    async fn create_question(&self, new: NewQuestion) -> RepoResult<Question>;

    // --- Responses ---
    // Visible responses of the given questions, oldest first.
    async fn list_responses(&self, viewer: &Viewer, question_ids: &[i64]) -> RepoResult<Vec<Response>>;
    async fn get_visible_response(&self, viewer: &Viewer, id: i64) -> RepoResult<Option<Response>>;
    async fn create_response(&self, new: NewResponse) -> RepoResult<Response>;

    // --- Moderation Transitions ---
    async fn set_question_status(&self, id: i64, status: Status) -> RepoResult<()>;
    async fn toggle_question_lock(&self, id: i64) -> RepoResult<()>;
    // Removes the question together with its responses and category links.
    async fn delete_question(&self, id: i64) -> RepoResult<()>;
    async fn clear_accepted(&self, question_id: i64) -> RepoResult<()>;
    async fn set_response_status(&self, id: i64, status: Status) -> RepoResult<()>;
    async fn delete_response(&self, id: i64) -> RepoResult<()>;
    // Accepts the response and un-accepts every sibling on the same question.
    async fn accept_response(&self, id: i64) -> RepoResult<()>;
}

/// RepositoryState
///
/// The shared handle stored in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;

const QUESTION_COLUMNS: &str = "q.id, q.user_id, q.name, q.email, q.title, q.body, q.status, \
     q.locked, q.recommended, q.hits, q.added, q.lastchanged";

const QUESTION_RETURNING: &str = "id, user_id, name, email, title, body, status, \
     locked, recommended, hits, added, lastchanged";

const RESPONSE_COLUMNS: &str = "r.id, r.question_id, r.user_id, r.name, r.email, r.body, \
     r.status, r.accepted, r.phone_number, r.added, r.lastchanged";

const RESPONSE_RETURNING: &str = "id, question_id, user_id, name, email, body, \
     status, accepted, phone_number, added, lastchanged";

#[derive(FromRow)]
struct QuestionCategoryRow {
    question_id: i64,
    id: i64,
    title: String,
    slug: String,
}

/// like_pattern
///
/// Wraps a search term for `ILIKE`, escaping the wildcard characters it contains.
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_question_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &QuestionFilter) {
    if let Some(term) = filter.search_term() {
        let pattern = like_pattern(term);
        builder.push(" AND (q.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR q.body ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(category_id) = filter.category_id {
        builder.push(
            " AND EXISTS (SELECT 1 FROM question_categories qc WHERE qc.question_id = q.id AND qc.category_id = ",
        );
        builder.push_bind(category_id);
        builder.push(")");
    }
    if let Some(owner) = filter.owner {
        builder.push(" AND q.user_id = ");
        builder.push_bind(owner);
    }
    if filter.recommended_only {
        builder.push(" AND q.recommended = TRUE");
    }
}

fn order_clause(order: QuestionOrder) -> &'static str {
    match order {
        QuestionOrder::Newest => " ORDER BY q.added DESC, q.id DESC",
        QuestionOrder::MostHits => " ORDER BY q.hits DESC, q.id DESC",
        QuestionOrder::RecentlyChanged => " ORDER BY q.lastchanged DESC, q.id DESC",
    }
}

/// PostgresRepository
///
/// The `Repository` backed by PostgreSQL. Queries are built at runtime with
/// `QueryBuilder` so visibility predicates and filters compose, and every value
/// goes through a bind parameter.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT id, email, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_author(&self, user_id: Uuid) -> RepoResult<Option<Author>> {
        sqlx::query_as::<_, Author>("SELECT user_id, company FROM authors WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_company_by_name(&self, name: &str) -> RepoResult<Option<Company>> {
        sqlx::query_as::<_, Company>("SELECT id, name, website FROM companies WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_categories(&self) -> RepoResult<Vec<Category>> {
        sqlx::query_as::<_, Category>("SELECT id, title, slug FROM categories ORDER BY title ASC, id ASC")
            .fetch_all(&self.pool)
            .await
    }

    async fn get_category_by_slug(&self, slug: &str) -> RepoResult<Option<Category>> {
        sqlx::query_as::<_, Category>("SELECT id, title, slug FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_question_categories(&self, question_ids: &[i64]) -> RepoResult<Vec<(i64, Category)>> {
        if question_ids.is_empty() {
            return Ok(vec![]);
        }
        let rows = sqlx::query_as::<_, QuestionCategoryRow>(
            r#"
            SELECT qc.question_id, c.id, c.title, c.slug
            FROM question_categories qc
            JOIN categories c ON c.id = qc.category_id
            WHERE qc.question_id = ANY($1)
            ORDER BY c.title ASC, c.id ASC
            "#,
        )
        .bind(question_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.question_id,
                    Category {
                        id: row.id,
                        title: row.title,
                        slug: row.slug,
                    },
                )
            })
            .collect())
    }

    /// count_questions
    ///
    /// Same predicate and filter as `list_questions`, feeding the paginator.
    async fn count_questions(&self, viewer: &Viewer, filter: &QuestionFilter) -> RepoResult<i64> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM questions q WHERE ");
        viewer.push_question_predicate(&mut builder);
        push_question_filter(&mut builder, filter);

        builder.build_query_scalar::<i64>().fetch_one(&self.pool).await
    }

    async fn list_questions(
        &self,
        viewer: &Viewer,
        filter: &QuestionFilter,
        slice: Option<Slice>,
    ) -> RepoResult<Vec<Question>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        builder.push(QUESTION_COLUMNS);
        builder.push(" FROM questions q WHERE ");
        viewer.push_question_predicate(&mut builder);
        push_question_filter(&mut builder, filter);
        builder.push(order_clause(filter.order));

        if let Some(slice) = slice {
            builder.push(" LIMIT ");
            builder.push_bind(slice.limit);
            builder.push(" OFFSET ");
            builder.push_bind(slice.offset);
        }

        builder.build_query_as::<Question>().fetch_all(&self.pool).await
    }

    async fn get_visible_question(&self, viewer: &Viewer, id: i64) -> RepoResult<Option<Question>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        builder.push(QUESTION_COLUMNS);
        builder.push(" FROM questions q WHERE q.id = ");
        builder.push_bind(id);
        builder.push(" AND ");
        viewer.push_question_predicate(&mut builder);

        builder.build_query_as::<Question>().fetch_optional(&self.pool).await
    }

    async fn get_question(&self, id: i64) -> RepoResult<Option<Question>> {
        let sql = format!("SELECT {} FROM questions q WHERE q.id = $1", QUESTION_COLUMNS);
        sqlx::query_as::<_, Question>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// increment_hits
    ///
    /// Single-statement increment; concurrent views are serialized by the row lock.
    async fn increment_hits(&self, id: i64) -> RepoResult<i64> {
        sqlx::query_scalar::<_, i64>("UPDATE questions SET hits = hits + 1 WHERE id = $1 RETURNING hits")
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    /// create_question
    ///
    /// Inserts the question and its category links in one transaction. Category ids
    /// that no longer exist are skipped.
    async fn create_question(&self, new: NewQuestion) -> RepoResult<Question> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO questions (user_id, name, email, title, body, status) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            QUESTION_RETURNING
        );
        let question = sqlx::query_as::<_, Question>(&sql)
            .bind(new.user_id)
            .bind(&new.name)
            .bind(&new.email)
            .bind(&new.title)
            .bind(&new.body)
            .bind(new.status)
            .fetch_one(&mut *tx)
            .await?;

        if !new.category_ids.is_empty() {
            sqlx::query(
                "INSERT INTO question_categories (question_id, category_id) \
                 SELECT $1, id FROM categories WHERE id = ANY($2)",
            )
            .bind(question.id)
            .bind(&new.category_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(question)
    }

    async fn list_responses(&self, viewer: &Viewer, question_ids: &[i64]) -> RepoResult<Vec<Response>> {
        if question_ids.is_empty() {
            return Ok(vec![]);
        }
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        builder.push(RESPONSE_COLUMNS);
        builder.push(" FROM responses r JOIN questions q ON q.id = r.question_id WHERE r.question_id = ANY(");
        builder.push_bind(question_ids.to_vec());
        builder.push(") AND ");
        viewer.push_response_predicate(&mut builder);
        builder.push(" ORDER BY r.added ASC, r.id ASC");

        builder.build_query_as::<Response>().fetch_all(&self.pool).await
    }

    async fn get_visible_response(&self, viewer: &Viewer, id: i64) -> RepoResult<Option<Response>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        builder.push(RESPONSE_COLUMNS);
        builder.push(" FROM responses r JOIN questions q ON q.id = r.question_id WHERE r.id = ");
        builder.push_bind(id);
        builder.push(" AND ");
        viewer.push_response_predicate(&mut builder);

        builder.build_query_as::<Response>().fetch_optional(&self.pool).await
    }

    async fn create_response(&self, new: NewResponse) -> RepoResult<Response> {
        let sql = format!(
            "INSERT INTO responses (question_id, user_id, name, email, body, status, phone_number) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            RESPONSE_RETURNING
        );
        sqlx::query_as::<_, Response>(&sql)
            .bind(new.question_id)
            .bind(new.user_id)
            .bind(&new.name)
            .bind(&new.email)
            .bind(&new.body)
            .bind(new.status)
            .bind(&new.phone_number)
            .fetch_one(&self.pool)
            .await
    }

    async fn set_question_status(&self, id: i64, status: Status) -> RepoResult<()> {
        sqlx::query("UPDATE questions SET status = $1, lastchanged = NOW() WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn toggle_question_lock(&self, id: i64) -> RepoResult<()> {
        sqlx::query("UPDATE questions SET locked = NOT locked, lastchanged = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_question(&self, id: i64) -> RepoResult<()> {
        // Responses and category links go with it (ON DELETE CASCADE).
        sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_accepted(&self, question_id: i64) -> RepoResult<()> {
        sqlx::query("UPDATE responses SET accepted = FALSE WHERE question_id = $1 AND accepted")
            .bind(question_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_response_status(&self, id: i64, status: Status) -> RepoResult<()> {
        sqlx::query("UPDATE responses SET status = $1, lastchanged = NOW() WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_response(&self, id: i64) -> RepoResult<()> {
        sqlx::query("DELETE FROM responses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn accept_response(&self, id: i64) -> RepoResult<()> {
        sqlx::query(
            r#"
            UPDATE responses SET accepted = (id = $1)
            WHERE question_id = (SELECT question_id FROM responses WHERE id = $1)
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
