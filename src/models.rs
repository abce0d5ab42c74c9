use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

pub const TITLE_MAX_CHARS: usize = 100;
pub const CONTENT_MAX_CHARS: usize = 1000;

// --- Enumerations (mapped to Postgres enum types) ---

/// SourcePlatform
///
/// Where the reported item was originally seen.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, TS, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "news_source_platform", rename_all = "lowercase")]
#[ts(export)]
pub enum SourcePlatform {
    Website,
    Facebook,
    Twitter,
    Instagram,
    Whatsapp,
    Telegram,
    Youtube,
    Other,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, TS, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "news_category", rename_all = "lowercase")]
#[ts(export)]
pub enum Category {
    Politics,
    Technology,
    Health,
    Other,
}

/// Assessment
///
/// The submitter's credibility verdict. Exposed to list filtering as `status`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, TS, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "news_assessment", rename_all = "kebab-case")]
#[ts(export)]
pub enum Assessment {
    LikelyTrue,
    #[default]
    Unsure,
    LikelyFalse,
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Minimal identity record in the `users` table. Written by the external
/// identity provider; this service only reads it to resolve authors.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

/// NewsItem
///
/// A user-submitted news record from the `news` table.
/// `author_id` is fixed at creation; only the author may mutate or delete the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewsItem {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub source_platform: SourcePlatform,
    pub source_url: Option<String>,
    pub category: Category,
    // Public URL of the hosted image.
    pub image_url: Option<String>,
    // Media sink handle, needed to delete the hosted image later.
    pub media_id: Option<String>,
    pub assessment: Assessment,
    pub author_id: Uuid,
    pub views: i64,
    pub shares: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// AuthorSummary
///
/// Public identity attached to read responses. `username` is `None` when the
/// author's user row no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: Option<String>,
}

/// NewsView
///
/// A news record with its author resolved, returned by the list and detail endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NewsView {
    #[serde(flatten)]
    pub news: NewsItem,
    pub author: AuthorSummary,
}

/// NewsPage
///
/// Output of `GET /news`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewsPage {
    pub news: Vec<NewsView>,
    pub total_pages: u64,
    pub current_page: u64,
    pub has_more: bool,
}

/// MessageResponse
///
/// `{ "message": ... }` body used for confirmations and every error.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// CreateNewsRequest
///
/// Client-writable fields for `POST /news`. Unknown fields (including
/// `authorId`, `mediaId`, `views`) are rejected.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateNewsRequest {
    pub title: String,
    pub content: String,
    pub source_platform: SourcePlatform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<Assessment>,
}

/// UpdateNewsRequest
///
/// Partial update payload for `PUT /news/{id}`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateNewsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_platform: Option<SourcePlatform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<Assessment>,
}

// --- Store Inputs ---

/// ValidationError
///
/// A field failed its schema rule; the write is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// NewNews
///
/// A fully-formed record ready for `NewsRepository::insert`. The author comes
/// from the verified identity, never from the request body.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNews {
    pub title: String,
    pub content: String,
    pub source_platform: SourcePlatform,
    pub source_url: Option<String>,
    pub category: Category,
    pub image_url: Option<String>,
    pub media_id: Option<String>,
    pub assessment: Assessment,
    pub author_id: Uuid,
}

impl NewNews {
    pub fn new(req: CreateNewsRequest, author_id: Uuid) -> Self {
        Self {
            title: req.title.trim().to_string(),
            content: req.content,
            source_platform: req.source_platform,
            source_url: req.source_url,
            category: req.category,
            image_url: None,
            media_id: None,
            assessment: req.assessment.unwrap_or_default(),
            author_id,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        validate_content(&self.content)
    }
}

/// NewsPatch
///
/// Field-level partial update applied by `NewsRepository::update_by_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub source_platform: Option<SourcePlatform>,
    pub source_url: Option<String>,
    pub category: Option<Category>,
    pub assessment: Option<Assessment>,
    pub image_url: Option<String>,
    pub media_id: Option<String>,
}

impl From<UpdateNewsRequest> for NewsPatch {
    fn from(req: UpdateNewsRequest) -> Self {
        Self {
            title: req.title.map(|t| t.trim().to_string()),
            content: req.content,
            source_platform: req.source_platform,
            source_url: req.source_url,
            category: req.category,
            assessment: req.assessment,
            image_url: None,
            media_id: None,
        }
    }
}

impl NewsPatch {
    /// Only the fields being changed are checked.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(content) = &self.content {
            validate_content(content)?;
        }
        Ok(())
    }

    /// Applies the patch in place. Shared by store implementations that
    /// mutate records in memory.
    pub fn apply_to(&self, news: &mut NewsItem) {
        if let Some(title) = &self.title {
            news.title = title.clone();
        }
        if let Some(content) = &self.content {
            news.content = content.clone();
        }
        if let Some(platform) = self.source_platform {
            news.source_platform = platform;
        }
        if let Some(url) = &self.source_url {
            news.source_url = Some(url.clone());
        }
        if let Some(category) = self.category {
            news.category = category;
        }
        if let Some(assessment) = self.assessment {
            news.assessment = assessment;
        }
        if let Some(image_url) = &self.image_url {
            news.image_url = Some(image_url.clone());
        }
        if let Some(media_id) = &self.media_id {
            news.media_id = Some(media_id.clone());
        }
    }
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.is_empty() {
        return Err(ValidationError("title is required".to_string()));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(ValidationError(format!(
            "title must be at most {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<(), ValidationError> {
    if content.is_empty() {
        return Err(ValidationError("content is required".to_string()));
    }
    if content.chars().count() > CONTENT_MAX_CHARS {
        return Err(ValidationError(format!(
            "content must be at most {CONTENT_MAX_CHARS} characters"
        )));
    }
    Ok(())
}
