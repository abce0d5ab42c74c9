use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::{AppError, AppResult},
    models::{
        CreateNewsRequest, MessageResponse, NewNews, NewsItem, NewsPage, NewsPatch, NewsView,
        UpdateNewsRequest,
    },
    pagination::ListQuery,
    repository::RepositoryState,
    storage::{ImageUpload, MediaState, StoredMedia},
};

/// NewsService
///
/// Business rules over the News Store and the Media Sink: listing, creation,
/// retrieval, and the owner-only update/delete flow. Existence and ownership
/// are always checked before any mutating store call.
#[derive(Clone)]
pub struct NewsService {
    repo: RepositoryState,
    media: MediaState,
}

impl NewsService {
    pub fn new(repo: RepositoryState, media: MediaState) -> Self {
        Self { repo, media }
    }

    /// listNews: one filtered page, newest first, with page metadata.
    #[instrument(skip(self))]
    pub async fn list_news(&self, query: ListQuery) -> AppResult<NewsPage> {
        let ListQuery { pagination, filter } = query;

        let (news, total) = self
            .repo
            .find_many(&filter, pagination.offset(), pagination.page_size)
            .await?;

        Ok(NewsPage {
            news,
            total_pages: pagination.total_pages(total),
            current_page: pagination.page,
            has_more: pagination.has_more(total),
        })
    }

    /// createNews
    ///
    /// The payload is validated before the image is uploaded, so a rejected
    /// record never leaves an orphaned object behind.
    #[instrument(skip(self, req, image), fields(author_id = %identity.id))]
    pub async fn create_news(
        &self,
        identity: &AuthUser,
        req: CreateNewsRequest,
        image: Option<ImageUpload>,
    ) -> AppResult<NewsItem> {
        let mut news = NewNews::new(req, identity.id);
        news.validate()?;

        let uploaded = self.upload(image).await?;
        if let Some(media) = &uploaded {
            news.image_url = Some(media.url.clone());
            news.media_id = Some(media.media_id.clone());
        }

        match self.repo.insert(news).await {
            Ok(created) => {
                info!(news_id = %created.id, "news created");
                Ok(created)
            }
            Err(err) => {
                self.discard_upload(uploaded).await;
                Err(err)
            }
        }
    }

    /// getNews: a single record with its author resolved.
    pub async fn get_news(&self, id: Uuid) -> AppResult<NewsView> {
        self.repo
            .find_view_by_id(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// updateNews
    ///
    /// Owner-only partial update. A new image replaces `imageUrl`/`mediaId`;
    /// the previous object is deleted once the update has been stored.
    #[instrument(skip(self, req, image), fields(author_id = %identity.id))]
    pub async fn update_news(
        &self,
        identity: &AuthUser,
        id: Uuid,
        req: UpdateNewsRequest,
        image: Option<ImageUpload>,
    ) -> AppResult<NewsItem> {
        let existing = self.owned_record(identity, id).await?;

        let mut patch = NewsPatch::from(req);
        patch.validate()?;

        let uploaded = self.upload(image).await?;
        if let Some(media) = &uploaded {
            patch.image_url = Some(media.url.clone());
            patch.media_id = Some(media.media_id.clone());
        }
        let replaced_image = uploaded.is_some();

        match self.repo.update_by_id(id, identity.id, patch).await {
            Ok(Some(updated)) => {
                info!(news_id = %id, "news updated");
                if replaced_image {
                    if let Some(old_media_id) = existing.media_id {
                        self.discard_media(&old_media_id).await;
                    }
                }
                Ok(updated)
            }
            // Deleted between the ownership check and the write.
            Ok(None) => {
                self.discard_upload(uploaded).await;
                Err(AppError::NotFound)
            }
            Err(err) => {
                self.discard_upload(uploaded).await;
                Err(err)
            }
        }
    }

    /// deleteNews: owner-only removal, followed by removal of the hosted image.
    #[instrument(skip(self), fields(author_id = %identity.id))]
    pub async fn delete_news(&self, identity: &AuthUser, id: Uuid) -> AppResult<MessageResponse> {
        let existing = self.owned_record(identity, id).await?;

        if !self.repo.delete_by_id(id, identity.id).await? {
            return Err(AppError::NotFound);
        }
        info!(news_id = %id, "news deleted");

        if let Some(media_id) = existing.media_id {
            self.discard_media(&media_id).await;
        }

        Ok(MessageResponse::new("News deleted successfully"))
    }

    /// Fetches `id` and verifies `identity` authored it.
    async fn owned_record(&self, identity: &AuthUser, id: Uuid) -> AppResult<NewsItem> {
        let existing = self.repo.find_by_id(id).await?.ok_or(AppError::NotFound)?;
        if existing.author_id != identity.id {
            warn!(news_id = %id, owner_id = %existing.author_id, "ownership check failed");
            return Err(AppError::Forbidden);
        }
        Ok(existing)
    }

    async fn upload(&self, image: Option<ImageUpload>) -> AppResult<Option<StoredMedia>> {
        match image {
            Some(image) => Ok(Some(self.media.upload(image).await?)),
            None => Ok(None),
        }
    }

    async fn discard_upload(&self, uploaded: Option<StoredMedia>) {
        if let Some(media) = uploaded {
            self.discard_media(&media.media_id).await;
        }
    }

    /// Best-effort delete; a failure only leaves an unreferenced object.
    async fn discard_media(&self, media_id: &str) {
        if let Err(e) = self.media.delete(media_id).await {
            warn!(media_id = %media_id, error = %e, "failed to delete media");
        }
    }
}
