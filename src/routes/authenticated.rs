use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{post, put},
};

/// Headroom over the image limit for the text fields and multipart framing.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Authenticated Router Module
///
/// Every route here requires a verified identity. The router is wrapped in
/// `auth_middleware` by `create_router`; ownership of existing records is
/// enforced by `NewsService`, not here.
///
/// `max_upload_bytes` raises axum's default body limit so an image at the
/// configured size reaches the upload policy instead of being cut off by the
/// transport.
pub fn authenticated_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::<AppState>::new()
        // POST /news
        // JSON or multipart with an optional `image` part. Author is the caller.
        .route("/news", post(handlers::create_news))
        // PUT/DELETE /news/{id}
        // Owner-only. A non-owner gets 403, an unknown id 404.
        .route(
            "/news/{id}",
            put(handlers::update_news).delete(handlers::delete_news),
        )
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(FORM_OVERHEAD_BYTES),
        ))
}
