//! Postgres-backed store tests. Run with a migrated database:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`

use fakebuster_api::{
    AppError,
    models::{Assessment, Category, NewNews, NewsPatch, SourcePlatform, User},
    repository::{NewsFilter, NewsRepository, PostgresRepository},
};
use serial_test::serial;
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

async fn create_test_user(pool: &PgPool, username: &str) -> User {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (id, username) VALUES ($1, $2) RETURNING id, username",
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .fetch_one(pool)
    .await
    .expect("Failed to create test user")
}

/// A record whose title carries `marker`, so searches stay isolated from
/// rows written by other tests.
fn new_news(author_id: Uuid, marker: &str, category: Category) -> NewNews {
    NewNews {
        title: format!("{marker} headline"),
        content: "Body text".to_string(),
        source_platform: SourcePlatform::Website,
        source_url: Some("https://example.com/a".to_string()),
        category,
        image_url: None,
        media_id: None,
        assessment: Assessment::Unsure,
        author_id,
    }
}

fn marker() -> String {
    format!("m{}", Uuid::new_v4().simple())
}

// --- Tests ---

#[tokio::test]
#[ignore]
#[serial]
async fn test_insert_and_find_with_author() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create_test_user(&ctx.pool, "pg-author").await;

    let created = repo
        .insert(new_news(user.id, &marker(), Category::Health))
        .await
        .unwrap();
    assert_eq!(created.views, 0);
    assert_eq!(created.assessment, Assessment::Unsure);

    let view = repo.find_view_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(view.news, created);
    assert_eq!(view.author.username.as_deref(), Some("pg-author"));

    assert!(repo.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_insert_rejects_invalid_title() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create_test_user(&ctx.pool, "pg-invalid").await;

    let mut news = new_news(user.id, "x", Category::Other);
    news.title = "t".repeat(101);

    let err = repo.insert(news).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_find_many_filters_and_counts() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create_test_user(&ctx.pool, "pg-lister").await;
    let tag = marker();

    for _ in 0..3 {
        repo.insert(new_news(user.id, &tag, Category::Politics))
            .await
            .unwrap();
    }
    repo.insert(new_news(user.id, &tag, Category::Health))
        .await
        .unwrap();

    let filter = NewsFilter {
        category: Some(Category::Politics),
        search: Some(tag.to_uppercase()),
        ..NewsFilter::default()
    };
    let (page, total) = repo.find_many(&filter, 0, 2).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(page.len(), 2);
    assert!(page[0].news.created_at >= page[1].news.created_at);

    let (rest, _) = repo.find_many(&filter, 2, 2).await.unwrap();
    assert_eq!(rest.len(), 1);
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_search_treats_wildcards_literally() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create_test_user(&ctx.pool, "pg-wildcard").await;
    let tag = marker();

    repo.insert(new_news(user.id, &tag, Category::Other))
        .await
        .unwrap();

    let filter = NewsFilter {
        search: Some(format!("{tag}%")),
        ..NewsFilter::default()
    };
    let (_, total) = repo.find_many(&filter, 0, 10).await.unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_update_and_delete_are_owner_scoped() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&ctx.pool, "pg-owner").await;
    let other = create_test_user(&ctx.pool, "pg-other").await;

    let created = repo
        .insert(new_news(owner.id, &marker(), Category::Technology))
        .await
        .unwrap();

    let patch = NewsPatch {
        assessment: Some(Assessment::LikelyTrue),
        ..NewsPatch::default()
    };

    // Wrong author: no row matches.
    assert!(
        repo.update_by_id(created.id, other.id, patch.clone())
            .await
            .unwrap()
            .is_none()
    );
    assert!(!repo.delete_by_id(created.id, other.id).await.unwrap());

    let updated = repo
        .update_by_id(created.id, owner.id, patch)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.assessment, Assessment::LikelyTrue);
    assert_eq!(updated.title, created.title);
    assert!(updated.updated_at >= created.updated_at);

    assert!(repo.delete_by_id(created.id, owner.id).await.unwrap());
    assert!(repo.find_by_id(created.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_get_user() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create_test_user(&ctx.pool, "pg-lookup").await;

    let found = repo.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(found.username, "pg-lookup");
    assert!(repo.get_user(Uuid::new_v4()).await.unwrap().is_none());
}
