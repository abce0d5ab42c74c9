use crate::errors::AppResult;
use crate::models::{
    Assessment, AuthorSummary, Category, NewNews, NewsItem, NewsPatch, NewsView, User,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, PgPool, Postgres, query_builder::QueryBuilder};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// NewsFilter
///
/// Conjunction of optional criteria applied by `find_many`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsFilter {
    pub category: Option<Category>,
    pub assessment: Option<Assessment>,
    /// Case-insensitive literal substring of title OR content.
    pub search: Option<String>,
}

impl NewsFilter {
    /// In-process evaluation of the filter, equivalent to the SQL predicate.
    pub fn matches(&self, news: &NewsItem) -> bool {
        if self.category.is_some_and(|c| c != news.category) {
            return false;
        }
        if self.assessment.is_some_and(|a| a != news.assessment) {
            return false;
        }
        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                news.title.to_lowercase().contains(&term)
                    || news.content.to_lowercase().contains(&term)
            }
            None => true,
        }
    }
}

/// NewsRepository
///
/// The News Store contract. Every write validates its input first. The
/// mutating calls match on `id AND author_id` in a single statement, so a
/// write racing a delete reports "not found" instead of touching another row.
#[async_trait]
pub trait NewsRepository: Send + Sync {
    /// Persists a new record with a server-assigned id and timestamps.
    async fn insert(&self, news: NewNews) -> AppResult<NewsItem>;

    /// One page of matching records (newest first) with authors resolved,
    /// plus the total number of matches ignoring offset/limit.
    async fn find_many(
        &self,
        filter: &NewsFilter,
        offset: u64,
        limit: u64,
    ) -> AppResult<(Vec<NewsView>, u64)>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<NewsItem>>;

    async fn find_view_by_id(&self, id: Uuid) -> AppResult<Option<NewsView>>;

    /// Applies `patch` if the record exists and belongs to `author_id`.
    async fn update_by_id(
        &self,
        id: Uuid,
        author_id: Uuid,
        patch: NewsPatch,
    ) -> AppResult<Option<NewsItem>>;

    /// Removes the record if it exists and belongs to `author_id`.
    async fn delete_by_id(&self, id: Uuid, author_id: Uuid) -> AppResult<bool>;

    // --- Identity lookups ---
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn NewsRepository>;

/// Escapes LIKE metacharacters so user text matches literally.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

const NEWS_COLUMNS: &str = "id, title, content, source_platform, source_url, category, \
     image_url, media_id, assessment, author_id, views, shares, created_at, updated_at";

const VIEW_SELECT: &str = "SELECT n.id, n.title, n.content, n.source_platform, n.source_url, \
     n.category, n.image_url, n.media_id, n.assessment, n.author_id, n.views, n.shares, \
     n.created_at, n.updated_at, u.username AS author_username \
     FROM news n LEFT JOIN users u ON u.id = n.author_id";

/// A news row joined with its author's username.
#[derive(FromRow)]
struct NewsViewRow {
    #[sqlx(flatten)]
    news: NewsItem,
    author_username: Option<String>,
}

impl From<NewsViewRow> for NewsView {
    fn from(row: NewsViewRow) -> Self {
        let author = AuthorSummary {
            id: row.news.author_id,
            username: row.author_username,
        };
        NewsView {
            news: row.news,
            author,
        }
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &NewsFilter) {
    if let Some(category) = filter.category {
        builder.push(" AND n.category = ");
        builder.push_bind(category);
    }
    if let Some(assessment) = filter.assessment {
        builder.push(" AND n.assessment = ");
        builder.push_bind(assessment);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        builder.push(" AND (n.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR n.content ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

/// PostgresRepository
///
/// `NewsRepository` backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NewsRepository for PostgresRepository {
    async fn insert(&self, news: NewNews) -> AppResult<NewsItem> {
        news.validate()?;

        let sql = format!(
            "INSERT INTO news (id, title, content, source_platform, source_url, category, \
             image_url, media_id, assessment, author_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {NEWS_COLUMNS}"
        );
        let created = sqlx::query_as::<_, NewsItem>(&sql)
            .bind(Uuid::new_v4())
            .bind(news.title)
            .bind(news.content)
            .bind(news.source_platform)
            .bind(news.source_url)
            .bind(news.category)
            .bind(news.image_url)
            .bind(news.media_id)
            .bind(news.assessment)
            .bind(news.author_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    /// find_many
    ///
    /// Both the page query and the count query share one filter builder, so the
    /// total always describes exactly the set being paged.
    async fn find_many(
        &self,
        filter: &NewsFilter,
        offset: u64,
        limit: u64,
    ) -> AppResult<(Vec<NewsView>, u64)> {
        let mut page: QueryBuilder<Postgres> = QueryBuilder::new(VIEW_SELECT);
        page.push(" WHERE TRUE");
        push_filter(&mut page, filter);
        page.push(" ORDER BY n.created_at DESC, n.id DESC LIMIT ");
        page.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        page.push(" OFFSET ");
        page.push_bind(i64::try_from(offset).unwrap_or(i64::MAX));

        let rows = page
            .build_query_as::<NewsViewRow>()
            .fetch_all(&self.pool)
            .await?;

        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM news n WHERE TRUE");
        push_filter(&mut count, filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok((
            rows.into_iter().map(NewsView::from).collect(),
            u64::try_from(total).unwrap_or(0),
        ))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<NewsItem>> {
        let sql = format!("SELECT {NEWS_COLUMNS} FROM news WHERE id = $1");
        let news = sqlx::query_as::<_, NewsItem>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(news)
    }

    async fn find_view_by_id(&self, id: Uuid) -> AppResult<Option<NewsView>> {
        let sql = format!("{VIEW_SELECT} WHERE n.id = $1");
        let row = sqlx::query_as::<_, NewsViewRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(NewsView::from))
    }

    /// update_by_id
    ///
    /// `COALESCE` leaves a column untouched when its patch field is `None`.
    async fn update_by_id(
        &self,
        id: Uuid,
        author_id: Uuid,
        patch: NewsPatch,
    ) -> AppResult<Option<NewsItem>> {
        patch.validate()?;

        let sql = format!(
            "UPDATE news \
             SET title = COALESCE($3, title), \
                 content = COALESCE($4, content), \
                 source_platform = COALESCE($5, source_platform), \
                 source_url = COALESCE($6, source_url), \
                 category = COALESCE($7, category), \
                 assessment = COALESCE($8, assessment), \
                 image_url = COALESCE($9, image_url), \
                 media_id = COALESCE($10, media_id), \
                 updated_at = NOW() \
             WHERE id = $1 AND author_id = $2 \
             RETURNING {NEWS_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, NewsItem>(&sql)
            .bind(id)
            .bind(author_id)
            .bind(patch.title)
            .bind(patch.content)
            .bind(patch.source_platform)
            .bind(patch.source_url)
            .bind(patch.category)
            .bind(patch.assessment)
            .bind(patch.image_url)
            .bind(patch.media_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(updated)
    }

    async fn delete_by_id(&self, id: Uuid, author_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM news WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, username FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

/// MemoryRepository
///
/// In-process `NewsRepository` with the same validation, ordering and
/// ownership semantics as the Postgres one. Used by tests and local demos.
#[derive(Default)]
pub struct MemoryRepository {
    news: RwLock<Vec<NewsItem>>,
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user so it can authenticate and be resolved as an author.
    pub fn add_user(&self, user: User) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.id, user);
    }

    pub fn len(&self) -> usize {
        self.news.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn view(&self, news: NewsItem) -> NewsView {
        let username = self
            .users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&news.author_id)
            .map(|u| u.username.clone());
        NewsView {
            author: AuthorSummary {
                id: news.author_id,
                username,
            },
            news,
        }
    }
}

#[async_trait]
impl NewsRepository for MemoryRepository {
    async fn insert(&self, news: NewNews) -> AppResult<NewsItem> {
        news.validate()?;

        let now = Utc::now();
        let created = NewsItem {
            id: Uuid::new_v4(),
            title: news.title,
            content: news.content,
            source_platform: news.source_platform,
            source_url: news.source_url,
            category: news.category,
            image_url: news.image_url,
            media_id: news.media_id,
            assessment: news.assessment,
            author_id: news.author_id,
            views: 0,
            shares: 0,
            created_at: now,
            updated_at: now,
        };
        self.news
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(created.clone());
        Ok(created)
    }

    async fn find_many(
        &self,
        filter: &NewsFilter,
        offset: u64,
        limit: u64,
    ) -> AppResult<(Vec<NewsView>, u64)> {
        let mut matching: Vec<NewsItem> = self
            .news
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect();
        // Stable sort keeps later inserts first among equal timestamps.
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|n| self.view(n))
            .collect();
        Ok((page, total))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<NewsItem>> {
        Ok(self
            .news
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|n| n.id == id)
            .cloned())
    }

    async fn find_view_by_id(&self, id: Uuid) -> AppResult<Option<NewsView>> {
        let news = self.find_by_id(id).await?;
        Ok(news.map(|n| self.view(n)))
    }

    async fn update_by_id(
        &self,
        id: Uuid,
        author_id: Uuid,
        patch: NewsPatch,
    ) -> AppResult<Option<NewsItem>> {
        patch.validate()?;

        let mut news = self.news.write().unwrap_or_else(PoisonError::into_inner);
        let Some(item) = news
            .iter_mut()
            .find(|n| n.id == id && n.author_id == author_id)
        else {
            return Ok(None);
        };
        patch.apply_to(item);
        item.updated_at = Utc::now();
        Ok(Some(item.clone()))
    }

    async fn delete_by_id(&self, id: Uuid, author_id: Uuid) -> AppResult<bool> {
        let mut news = self.news.write().unwrap_or_else(PoisonError::into_inner);
        let before = news.len();
        news.retain(|n| !(n.id == id && n.author_id == author_id));
        Ok(news.len() < before)
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self
            .users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("100%_sure\\"), "100\\%\\_sure\\\\");
        assert_eq!(escape_like("flu"), "flu");
    }

    #[test]
    fn filter_search_is_case_insensitive_over_title_or_content() {
        let now = Utc::now();
        let news = NewsItem {
            id: Uuid::new_v4(),
            title: "Seasonal FLU shots".to_string(),
            content: "Clinics open".to_string(),
            source_platform: crate::models::SourcePlatform::Website,
            source_url: None,
            category: Category::Health,
            image_url: None,
            media_id: None,
            assessment: Assessment::Unsure,
            author_id: Uuid::new_v4(),
            views: 0,
            shares: 0,
            created_at: now,
            updated_at: now,
        };

        let by_search = |s: &str| NewsFilter {
            search: Some(s.to_string()),
            ..NewsFilter::default()
        };
        assert!(by_search("flu").matches(&news));
        assert!(by_search("CLINIC").matches(&news));
        assert!(!by_search("vaccine").matches(&news));

        let wrong_category = NewsFilter {
            category: Some(Category::Politics),
            ..by_search("flu")
        };
        assert!(!wrong_category.matches(&news));
    }
}
