use crate::{
    AppState,
    auth::AuthUser,
    errors::AppResult,
    extract::NewsForm,
    models::{CreateNewsRequest, MessageResponse, NewsItem, NewsPage, NewsView, UpdateNewsRequest},
    pagination::{ListParams, ListQuery},
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use uuid::Uuid;

// Extractor rejections are taken as `Result` so they surface through
// `AppError` with the `{ message }` body instead of axum's plain-text defaults.

/// root
///
/// [Public Route] Service banner.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Welcome", body = MessageResponse))
)]
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse::new("Welcome to FakeBuster API"))
}

/// list_news
///
/// [Public Route] Lists news newest-first with optional `category`, `status`
/// and `search` filters, paginated by `page`/`limit`.
#[utoipa::path(
    get,
    path = "/news",
    params(ListParams),
    responses(
        (status = 200, description = "One page of news", body = NewsPage),
        (status = 400, description = "Invalid query", body = MessageResponse)
    )
)]
pub async fn list_news(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> AppResult<Json<NewsPage>> {
    let Query(params) = params?;
    let page = state.news.list_news(ListQuery::try_from(params)?).await?;
    Ok(Json(page))
}

/// get_news
///
/// [Public Route] A single record with its author resolved.
#[utoipa::path(
    get,
    path = "/news/{id}",
    params(("id" = Uuid, Path, description = "News ID")),
    responses(
        (status = 200, description = "Found", body = NewsView),
        (status = 404, description = "Not Found", body = MessageResponse)
    )
)]
pub async fn get_news(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<NewsView>> {
    let Path(id) = id?;
    Ok(Json(state.news.get_news(id).await?))
}

/// create_news
///
/// [Authenticated Route] Submits a news item. JSON, or multipart with an
/// optional `image` part. The author is always the authenticated caller.
#[utoipa::path(
    post,
    path = "/news",
    request_body(content = CreateNewsRequest, description = "JSON body, or multipart form with the same fields plus an optional `image` file"),
    responses(
        (status = 201, description = "Created", body = NewsItem),
        (status = 400, description = "Validation or upload error", body = MessageResponse),
        (status = 401, description = "Unauthenticated", body = MessageResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_news(
    user: AuthUser,
    State(state): State<AppState>,
    form: NewsForm<CreateNewsRequest>,
) -> AppResult<(StatusCode, Json<NewsItem>)> {
    let created = state
        .news
        .create_news(&user, form.payload, form.image)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// update_news
///
/// [Authenticated Route] Owner-only partial update.
#[utoipa::path(
    put,
    path = "/news/{id}",
    params(("id" = Uuid, Path, description = "News ID")),
    request_body(content = UpdateNewsRequest, description = "JSON body, or multipart form with the same fields plus an optional `image` file"),
    responses(
        (status = 200, description = "Updated", body = NewsItem),
        (status = 400, description = "Validation or upload error", body = MessageResponse),
        (status = 403, description = "Not Owner", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    ),
    security(("bearer" = []))
)]
pub async fn update_news(
    user: AuthUser,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    form: NewsForm<UpdateNewsRequest>,
) -> AppResult<Json<NewsItem>> {
    let Path(id) = id?;
    let updated = state
        .news
        .update_news(&user, id, form.payload, form.image)
        .await?;
    Ok(Json(updated))
}

/// delete_news
///
/// [Authenticated Route] Owner-only removal.
#[utoipa::path(
    delete,
    path = "/news/{id}",
    params(("id" = Uuid, Path, description = "News ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not Owner", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    ),
    security(("bearer" = []))
)]
pub async fn delete_news(
    user: AuthUser,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Path(id) = id?;
    Ok(Json(state.news.delete_news(&user, id).await?))
}
